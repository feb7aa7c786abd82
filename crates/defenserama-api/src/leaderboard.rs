use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use defenserama_types::models::Character;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::query_or_invalid;

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Raw text; anything unparsable means the default.
    pub limit: Option<String>,
}

impl LeaderboardQuery {
    fn limit(&self) -> usize {
        match self.limit.as_deref().map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(n)) => usize::try_from(n).unwrap_or(0),
            _ => DEFAULT_LIMIT,
        }
    }
}

/// GET /api/leaderboard/top
pub async fn top_defenders(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<Character>>, ApiError> {
    let limit = query_or_invalid(query)?.limit();
    let characters = blocking(&state, move |store| store.top_defenders(limit)).await?;
    Ok(Json(characters))
}

/// GET /api/leaderboard/plain
pub async fn hall_of_plain(
    State(state): State<AppState>,
    query: Result<Query<LeaderboardQuery>, QueryRejection>,
) -> Result<Json<Vec<Character>>, ApiError> {
    let limit = query_or_invalid(query)?.limit();
    let characters = blocking(&state, move |store| store.hall_of_plain(limit)).await?;
    Ok(Json(characters))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(raw: Option<&str>) -> usize {
        LeaderboardQuery {
            limit: raw.map(String::from),
        }
        .limit()
    }

    #[test]
    fn limit_parsing() {
        assert_eq!(limit(None), 10);
        assert_eq!(limit(Some("4")), 4);
        assert_eq!(limit(Some("abc")), 10);
        assert_eq!(limit(Some("-2")), 0);
        assert_eq!(limit(Some("0")), 0);
    }
}
