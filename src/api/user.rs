//! Endpoints for any authenticated user.

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::error::ApiError;
use super::extractors::{AnyRole, Auth};
use crate::service::AuthService;

#[derive(Clone)]
pub struct UserState {
    pub service: Arc<AuthService>,
}

pub fn router(state: UserState) -> Router {
    Router::new()
        .route("/profile", get(profile))
        .with_state(state)
}

async fn profile(
    State(state): State<UserState>,
    auth: Auth<AnyRole>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.service.profile(auth.identity()).await?;
    Ok(Json(profile))
}
