use axum::{
    Json,
    extract::{FromRequest, Query, Request, rejection::QueryRejection},
};
use defenserama_types::api::{FieldError, Validate};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON body that has been deserialized and passed `Validate`.
/// Any rejection becomes a 400 `ApiError::Validation`.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let message = format!("Invalid {} data", T::NAME);

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation {
                message: message.clone(),
                errors: vec![FieldError::new("body", rejection.body_text())],
            })?;

        value
            .validate()
            .map_err(|errors| ApiError::Validation { message, errors })?;

        Ok(Self(value))
    }
}

/// Path ids must be positive integers.
pub fn parse_id(raw: &str, entity: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::invalid(format!("Invalid {entity} ID"))),
    }
}

pub fn query_or_invalid<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|rejection| ApiError::Validation {
            message: "Invalid query parameters".into(),
            errors: vec![FieldError::new("query", rejection.body_text())],
        })
}
