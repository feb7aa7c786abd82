use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::error;

use defenserama_db::models::NewUser;
use defenserama_types::api::RegisterRequest;
use defenserama_types::models::User;

use crate::auth::{AppState, hash_password};
use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;

/// POST /api/users: register. The response never includes the password hash.
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Check if username is taken before paying for the hash
    let username = req.username.clone();
    if blocking(&state, move |store| store.get_user_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::Duplicate("Username already taken".into()));
    }

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            anyhow::anyhow!("password hashing task failed")
        })??;

    // The store re-checks uniqueness, so a concurrent registration still loses cleanly
    let row = blocking(&state, move |store| {
        store.create_user(NewUser {
            username: req.username,
            password: password_hash,
            text_avatar: req.text_avatar,
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(User::from(row))))
}
