//! Request body validation.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};

use super::error::ApiError;

/// Implemented by request bodies with field constraints. Errors read
/// `field: reason`.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// `Json` that also runs `Validate`, with rejections in the API error format.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation(e.body_text()))?;
        value.validate().map_err(ApiError::validation)?;
        Ok(Self(value))
    }
}

pub fn not_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{}: must not be blank", field));
    }
    Ok(())
}

pub fn min_length(field: &str, value: &str, min: usize) -> Result<(), String> {
    if value.chars().count() < min {
        return Err(format!("{}: must be at least {} characters", field, min));
    }
    Ok(())
}

/// Loose syntactic check: one `@`, non-empty local part, dot-separated
/// non-empty domain labels, no whitespace.
pub fn email(field: &str, value: &str) -> Result<(), String> {
    let invalid = || Err(format!("{}: must be a valid email", field));
    let value = value.trim();

    if value.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = value.split_once('@') else {
        return invalid();
    };
    if local.is_empty() || domain.contains('@') || domain.split('.').any(str::is_empty) {
        return invalid();
    }
    Ok(())
}
