use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{TrialDetail, User, Vote};

// -- JWT Claims --

/// Bearer token claims issued by `/api/login` and checked by `require_auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Validation --

/// One rejected field in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Schema checks that serde alone cannot express.
pub trait Validate {
    /// Noun used in rejection messages ("Invalid character data").
    const NAME: &'static str;

    fn validate(&self) -> Result<(), Vec<FieldError>>;
}

fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    }
}

fn require_id(errors: &mut Vec<FieldError>, field: &str, value: i64) {
    if value <= 0 {
        errors.push(FieldError::new(field, "must be a positive id"));
    }
}

fn optional_id(errors: &mut Vec<FieldError>, field: &str, value: Option<i64>) {
    if let Some(id) = value {
        require_id(errors, field, id);
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// -- Users & auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub text_avatar: Option<String>,
}

impl Validate for RegisterRequest {
    const NAME: &'static str = "user";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        let len = self.username.chars().count();
        if !(3..=32).contains(&len) {
            errors.push(FieldError::new("username", "must be between 3 and 32 characters"));
        }
        if self.password.chars().count() < 8 {
            errors.push(FieldError::new("password", "must be at least 8 characters"));
        }
        if let Some(avatar) = &self.text_avatar {
            require_text(&mut errors, "textAvatar", avatar);
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl Validate for LoginRequest {
    const NAME: &'static str = "login";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_text(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "must not be empty"));
        }
        finish(errors)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

// -- Characters --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateCharacterRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub text_avatar: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Validate for CreateCharacterRequest {
    const NAME: &'static str = "character";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        require_text(&mut errors, "type", &self.kind);
        require_text(&mut errors, "description", &self.description);
        require_text(&mut errors, "textAvatar", &self.text_avatar);
        optional_id(&mut errors, "userId", self.user_id);
        finish(errors)
    }
}

// -- Accusations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateAccusationRequest {
    pub content: String,
    #[serde(default)]
    pub is_custom: Option<bool>,
    #[serde(default)]
    pub created_by: Option<i64>,
}

impl Validate for CreateAccusationRequest {
    const NAME: &'static str = "accusation";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_text(&mut errors, "content", &self.content);
        optional_id(&mut errors, "createdBy", self.created_by);
        finish(errors)
    }
}

// -- Trials --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateTrialRequest {
    pub character_id: i64,
    pub accusation_id: i64,
    pub defense_title: String,
    pub defense_content: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Accepted for client compatibility; the store always sets its own end time.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl Validate for CreateTrialRequest {
    const NAME: &'static str = "trial";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_id(&mut errors, "characterId", self.character_id);
        require_id(&mut errors, "accusationId", self.accusation_id);
        require_text(&mut errors, "defenseTitle", &self.defense_title);
        require_text(&mut errors, "defenseContent", &self.defense_content);
        optional_id(&mut errors, "userId", self.user_id);
        finish(errors)
    }
}

/// `GET /api/trials/{id}`: the joined trial plus every vote cast on it.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrialWithVotes {
    #[serde(flatten)]
    pub detail: TrialDetail,
    pub votes: Vec<Vote>,
}

// -- Votes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub user_id: i64,
    pub trial_id: i64,
    pub is_innocent: bool,
}

impl Validate for CastVoteRequest {
    const NAME: &'static str = "vote";

    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require_id(&mut errors, "userId", self.user_id);
        require_id(&mut errors, "trialId", self.trial_id);
        finish(errors)
    }
}
