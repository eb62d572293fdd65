//! Registration, login and logout endpoints.

use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::HeaderMap, middleware, response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::meta::ClientMeta;
use super::middleware::{LoginRateLimit, rate_limit_login};
use super::validate::{Validate, ValidJson, email, min_length, not_blank};
use super::MessageResponse;
use crate::auth::{IpExtractor, bearer_token};
use crate::db::UserRole;
use crate::impl_has_ip_extractor;
use crate::service::{AuthService, RegisterRequest};

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<AuthService>,
    pub rate_limit: LoginRateLimit,
    pub ip_extractor: Option<IpExtractor>,
}

impl_has_ip_extractor!(AuthState);

/// Register and login. Login is rate limited per client address.
pub fn public_router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/auth/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/auth/register", post(register))
        .with_state(state)
        .merge(login_router)
}

/// Routes that sit behind the auth filter.
pub fn protected_router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    role: Option<UserRole>,
}

impl Validate for RegisterBody {
    fn validate(&self) -> Result<(), String> {
        not_blank("name", &self.name)?;
        not_blank("email", &self.email)?;
        email("email", &self.email)?;
        min_length("password", &self.password, MIN_PASSWORD_LENGTH)
    }
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl Validate for LoginBody {
    fn validate(&self) -> Result<(), String> {
        not_blank("email", &self.email)?;
        not_blank("password", &self.password)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: u64,
}

async fn register(
    State(state): State<AuthState>,
    ClientMeta(meta): ClientMeta,
    ValidJson(body): ValidJson<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .register(
            RegisterRequest {
                name: body.name,
                email: body.email,
                password: body.password,
                role: body.role,
            },
            &meta,
        )
        .await?;

    Ok(Json(MessageResponse::new("User registered successfully")))
}

async fn login(
    State(state): State<AuthState>,
    ClientMeta(meta): ClientMeta,
    ValidJson(body): ValidJson<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state
        .service
        .login(&body.email, &body.password, &meta)
        .await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer",
        expires_in: tokens.expires_in,
    }))
}

async fn logout(
    State(state): State<AuthState>,
    ClientMeta(meta): ClientMeta,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .logout(bearer_token(&headers), &meta)
        .await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}
