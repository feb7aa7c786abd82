use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a trial stays open for voting after it is filed.
pub const TRIAL_DURATION_DAYS: i64 = 3;

/// Avatar given to users who register without choosing one.
pub const DEFAULT_USER_AVATAR: &str = "(⌐□_□)";

/// A registered user. The password hash never leaves the db crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub karma: i64,
    pub text_avatar: String,
    pub created_at: DateTime<Utc>,
}

/// A defendant. `user_id` is `None` for system-provided characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: i64,
    pub name: String,
    /// Free-text category: HERO, VILLAIN, DETECTIVE, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub text_avatar: String,
    pub user_id: Option<i64>,
    pub karma: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accusation {
    pub id: i64,
    pub content: String,
    pub is_custom: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A character's defense against one accusation.
///
/// `karma_innocent` and `karma_guilty` only ever grow; each persisted vote
/// adds exactly one to one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub id: i64,
    pub character_id: i64,
    pub accusation_id: i64,
    pub defense_title: String,
    pub defense_content: String,
    pub user_id: Option<i64>,
    pub karma_innocent: i64,
    pub karma_guilty: i64,
    pub is_active: bool,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Trial {
    /// End time for a trial filed at `created_at`.
    pub fn end_time_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(TRIAL_DURATION_DAYS)
    }

    /// Expiry is computed lazily; `is_active` is only cleared by an explicit close.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn total_votes(&self) -> i64 {
        self.karma_innocent + self.karma_guilty
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: i64,
    pub trial_id: i64,
    pub user_id: i64,
    pub is_innocent: bool,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Effect on the defending character's karma: +1 innocent, -1 guilty.
    pub fn karma_delta(&self) -> i64 {
        if self.is_innocent { 1 } else { -1 }
    }
}

/// A bare trial as returned by create and close, with expiry computed at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialView {
    #[serde(flatten)]
    pub trial: Trial,
    pub is_expired: bool,
}

impl From<Trial> for TrialView {
    fn from(trial: Trial) -> Self {
        let is_expired = trial.is_expired_at(Utc::now());
        Self { trial, is_expired }
    }
}

/// A trial joined with the rows it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDetail {
    #[serde(flatten)]
    pub trial: Trial,
    pub is_expired: bool,
    pub character: Character,
    pub accusation: Accusation,
}

impl TrialDetail {
    pub fn new(trial: Trial, character: Character, accusation: Accusation) -> Self {
        let is_expired = trial.is_expired_at(Utc::now());
        Self {
            trial,
            is_expired,
            character,
            accusation,
        }
    }
}
