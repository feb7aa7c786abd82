use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use defenserama_db::models::{CharacterFilter, NewCharacter};
use defenserama_types::api::CreateCharacterRequest;
use defenserama_types::models::Character;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::{ValidJson, parse_id, query_or_invalid};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterQuery {
    /// Only characters owned by this user.
    pub user_id: Option<i64>,
}

pub async fn list_characters(
    State(state): State<AppState>,
    query: Result<Query<CharacterQuery>, QueryRejection>,
) -> Result<Json<Vec<Character>>, ApiError> {
    let query = query_or_invalid(query)?;
    let filter = CharacterFilter {
        user_id: query.user_id,
    };
    let characters = blocking(&state, move |store| store.list_characters(&filter)).await?;
    Ok(Json(characters))
}

pub async fn get_character(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Character>, ApiError> {
    let id = parse_id(&raw_id, "character")?;
    blocking(&state, move |store| store.get_character(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Character not found".into()))
}

pub async fn create_character(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<CreateCharacterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let character = blocking(&state, move |store| {
        store.create_character(NewCharacter {
            name: req.name,
            kind: req.kind,
            description: req.description,
            text_avatar: req.text_avatar,
            user_id: req.user_id,
        })
    })
    .await?;

    info!("Character {} ({}) created", character.id, character.name);
    Ok((StatusCode::CREATED, Json(character)))
}
