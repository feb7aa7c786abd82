use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use defenserama_db::models::NewAccusation;
use defenserama_types::api::CreateAccusationRequest;
use defenserama_types::models::Accusation;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;

pub async fn list_accusations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Accusation>>, ApiError> {
    let accusations = blocking(&state, |store| store.list_accusations()).await?;
    Ok(Json(accusations))
}

/// Uniform pick, independent of earlier calls.
pub async fn random_accusation(
    State(state): State<AppState>,
) -> Result<Json<Accusation>, ApiError> {
    blocking(&state, |store| store.random_accusation(&mut rand::rng()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No accusations found".into()))
}

pub async fn create_accusation(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateAccusationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let accusation = blocking(&state, move |store| {
        store.create_accusation(NewAccusation {
            content: req.content,
            is_custom: req.is_custom.unwrap_or(false),
            created_by: req.created_by,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(accusation)))
}
