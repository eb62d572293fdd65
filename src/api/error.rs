//! Shared error handling for API endpoints.
//!
//! Every error response has the body `{status, error, message, path}`.
//! Handlers don't know the request path, so `ApiError` renders an empty one
//! and the `error_path` middleware fills it in on the way out.

use axum::{
    Json,
    extract::{OriginalUri, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::service::ServiceError;

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// Request refused for a reason outside the service taxonomy.
    Forbidden(String),
}

impl ApiError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Service(ServiceError::Validation(msg.into()))
    }

    fn status_and_error(&self) -> (StatusCode, &'static str) {
        let ApiError::Service(e) = self else {
            return (StatusCode::FORBIDDEN, "Forbidden");
        };
        match e {
            ServiceError::DuplicateIdentity => (StatusCode::BAD_REQUEST, "Bad Request"),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation Error"),
            ServiceError::InvalidCredentials
            | ServiceError::AccountLocked
            | ServiceError::MissingToken
            | ServiceError::InvalidToken
            | ServiceError::RevokedToken => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ServiceError::InsufficientRole => (StatusCode::FORBIDDEN, "Forbidden"),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"),
            ServiceError::Unexpected(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Service(e) => e.to_string(),
            ApiError::Forbidden(msg) => msg.clone(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self::Service(e)
    }
}

/// Wire shape of an error. Also stored in the response extensions so
/// `error_path` can re-render it with the path.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    pub path: String,
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.clone())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_error();
        ErrorBody {
            status: status.as_u16(),
            error,
            message: self.message(),
            path: String::new(),
        }
        .into_response()
    }
}

/// Middleware filling in the `path` of error bodies.
pub async fn error_path(request: Request, next: Next) -> Response {
    // Nested routers see a stripped URI; the original one has the full path.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let body = response
        .extensions()
        .get::<ErrorBody>()
        .filter(|body| body.path.is_empty())
        .cloned();

    match body {
        Some(body) => ErrorBody { path, ..body }.into_response(),
        None => response,
    }
}
