//! Admin API endpoints.
//!
//! All endpoints require admin role.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;

use super::MessageResponse;
use super::error::ApiError;
use super::meta::ClientMeta;
use super::extractors::{AdminOnly, Auth};
use crate::audit::AuditAction;
use crate::auth::IpExtractor;
use crate::impl_has_ip_extractor;
use crate::service::AdminService;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<AdminService>,
    pub ip_extractor: Option<IpExtractor>,
}

impl_has_ip_extractor!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/{id}/lock", put(lock_user))
        .route("/users/{id}/unlock", put(unlock_user))
        .route("/audit-logs", get(audit_logs))
        .with_state(state)
}

async fn dashboard(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.dashboard().await?))
}

async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.service.list_users().await?))
}

async fn lock_user(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .lock_user(&id, auth.identity(), &meta)
        .await?;
    Ok(Json(MessageResponse::new("User account locked successfully")))
}

async fn unlock_user(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .unlock_user(&id, auth.identity(), &meta)
        .await?;
    Ok(Json(MessageResponse::new("User account unlocked successfully")))
}

#[derive(Deserialize)]
struct AuditLogQuery {
    username: Option<String>,
    action: Option<String>,
}

async fn audit_logs(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let action = query
        .action
        .as_deref()
        .map(|action| {
            AuditAction::parse(action)
                .ok_or_else(|| ApiError::validation(format!("action: unknown audit action {action}")))
        })
        .transpose()?;

    let records = state
        .service
        .audit_logs(query.username.as_deref(), action)
        .await?;
    Ok(Json(records))
}
