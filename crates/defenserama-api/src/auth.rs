use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::info;

use defenserama_db::Store;
use defenserama_types::api::{Claims, LoginRequest, LoginResponse};
use defenserama_types::models::User;

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ValidJson;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Box<dyn Store>,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(store: impl Store + 'static, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            store: Box::new(store),
            jwt_secret: jwt_secret.into(),
        })
    }
}

/// POST /api/login: verify credentials and issue a bearer token.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = blocking(&state, move |store| store.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Argon2 verification is CPU-bound; keep it off the async workers
    let stored_hash = user.password.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?;
    if !verified {
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.jwt_secret, user.id, &user.username)?;
    info!("User {} logged in", user.username);

    Ok(Json(LoginResponse {
        user: user.into(),
        token,
    }))
}

/// GET /api/user: the user behind the bearer token.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |store| store.get_user(claims.sub))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}

/// Argon2id PHC string for `password` with a fresh salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}
