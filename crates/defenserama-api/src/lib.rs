pub mod accusations;
pub mod auth;
pub mod characters;
pub mod error;
pub mod extract;
pub mod leaderboard;
pub mod middleware;
pub mod trials;
pub mod users;
pub mod votes;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use defenserama_db::{Store, StoreResult};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// Run a store call on the blocking pool.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Store) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || f(state.store.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            anyhow::anyhow!("store task failed")
        })?;
    Ok(result?)
}

/// Every route, without transport layers (CORS, tracing) which the binary adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route(
            "/api/characters",
            get(characters::list_characters).post(characters::create_character),
        )
        .route("/api/characters/{id}", get(characters::get_character))
        .route(
            "/api/accusations",
            get(accusations::list_accusations).post(accusations::create_accusation),
        )
        .route("/api/accusations/random", get(accusations::random_accusation))
        .route(
            "/api/trials",
            get(trials::list_trials).post(trials::create_trial),
        )
        .route("/api/trials/{id}", get(trials::get_trial))
        .route("/api/trials/{id}/end", post(trials::end_trial))
        .route("/api/votes", post(votes::cast_vote))
        .route("/api/leaderboard/top", get(leaderboard::top_defenders))
        .route("/api/leaderboard/plain", get(leaderboard::hall_of_plain))
        .route("/api/users", post(users::register))
        .route("/api/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/user", get(auth::current_user))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
