//! Request metadata for the audit trail.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{header, request::Parts},
};

use crate::audit::RequestMetadata;
use crate::auth::{IpExtractor, extract_client_ip};

/// Trait for state types that know how to find the client address.
pub trait HasIpExtractor {
    fn ip_extractor(&self) -> Option<&IpExtractor>;
}

/// Implement `HasIpExtractor` for a state struct with an
/// `ip_extractor: Option<IpExtractor>` field.
#[macro_export]
macro_rules! impl_has_ip_extractor {
    ($state_type:ty) => {
        impl $crate::api::HasIpExtractor for $state_type {
            fn ip_extractor(&self) -> Option<&$crate::auth::IpExtractor> {
                self.ip_extractor.as_ref()
            }
        }
    };
}

/// Extractor for the caller's address, user agent and endpoint. Never fails;
/// unknown pieces are left empty.
pub struct ClientMeta(pub RequestMetadata);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: HasIpExtractor + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let endpoint = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.0.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(ClientMeta(RequestMetadata {
            ip_address: extract_client_ip(&*parts, state.ip_extractor()).ok(),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            endpoint: Some(endpoint),
        }))
    }
}
