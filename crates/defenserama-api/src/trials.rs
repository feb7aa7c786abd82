use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use defenserama_db::models::{NewTrial, TrialFilter};
use defenserama_types::api::{CreateTrialRequest, TrialWithVotes};
use defenserama_types::models::{TrialDetail, TrialView};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::{ValidJson, parse_id, query_or_invalid};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialQuery {
    pub character_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Active trials, each joined with its character and accusation.
pub async fn list_trials(
    State(state): State<AppState>,
    query: Result<Query<TrialQuery>, QueryRejection>,
) -> Result<Json<Vec<TrialDetail>>, ApiError> {
    let query = query_or_invalid(query)?;
    let filter = TrialFilter {
        active_only: true,
        character_id: query.character_id,
        user_id: query.user_id,
    };
    let trials = blocking(&state, move |store| store.trial_details(&filter)).await?;
    Ok(Json(trials))
}

/// One trial with its joins and every vote cast on it.
pub async fn get_trial(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<TrialWithVotes>, ApiError> {
    let id = parse_id(&raw_id, "trial")?;

    blocking(&state, move |store| store.get_trial_with_votes(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Trial not found".into()))
}

pub async fn create_trial(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateTrialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let trial = blocking(&state, move |store| {
        store.create_trial(NewTrial {
            character_id: req.character_id,
            accusation_id: req.accusation_id,
            defense_title: req.defense_title,
            defense_content: req.defense_content,
            user_id: req.user_id,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(TrialView::from(trial))))
}

/// Close voting. Ending a closed trial is a no-op success.
pub async fn end_trial(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<TrialView>, ApiError> {
    let id = parse_id(&raw_id, "trial")?;
    let trial = blocking(&state, move |store| store.end_trial(id)).await?;

    info!(
        "Trial {} closed ({} innocent / {} guilty)",
        trial.id, trial.karma_innocent, trial.karma_guilty
    );
    Ok(Json(trial.into()))
}
