use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use defenserama_db::models::NewVote;
use defenserama_types::api::CastVoteRequest;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;

/// One verdict per user per trial.
pub async fn cast_vote(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_vote = NewVote {
        user_id: req.user_id,
        trial_id: req.trial_id,
        is_innocent: req.is_innocent,
    };
    let vote = blocking(&state, move |store| store.cast_vote(new_vote)).await?;

    info!(
        "User {} found trial {} {}",
        vote.user_id,
        vote.trial_id,
        if vote.is_innocent { "innocent" } else { "guilty" }
    );
    Ok((StatusCode::CREATED, Json(vote)))
}
