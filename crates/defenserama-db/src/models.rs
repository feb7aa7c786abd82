//! Store-side row and input types.
//! Distinct from defenserama-types API models where the two differ.

use chrono::{DateTime, Utc};
use defenserama_types::models::{Trial, User};

/// A user row, including the password hash the API must never echo.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub karma: i64,
    pub text_avatar: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            karma: row.karma,
            text_avatar: row.text_avatar,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Already hashed.
    pub password: String,
    pub text_avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub kind: String,
    pub description: String,
    pub text_avatar: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewAccusation {
    pub content: String,
    pub is_custom: bool,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTrial {
    pub character_id: i64,
    pub accusation_id: i64,
    pub defense_title: String,
    pub defense_content: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewVote {
    pub user_id: i64,
    pub trial_id: i64,
    pub is_innocent: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterFilter {
    pub user_id: Option<i64>,
}

impl CharacterFilter {
    pub fn matches(&self, user_id: Option<i64>) -> bool {
        self.user_id.is_none() || self.user_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrialFilter {
    pub active_only: bool,
    pub character_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl TrialFilter {
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, trial: &Trial) -> bool {
        (!self.active_only || trial.is_active)
            && self.character_id.is_none_or(|id| trial.character_id == id)
            && self.user_id.is_none_or(|id| trial.user_id == Some(id))
    }
}
