//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::{
    extract::ConnectInfo,
    http::{HeaderName, request::Parts},
};

/// Reads the client address from a trusted reverse-proxy header.
#[derive(Debug, Clone)]
pub struct IpExtractor {
    header_name: HeaderName,
}

impl IpExtractor {
    pub fn new(header_name: HeaderName) -> Self {
        Self { header_name }
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Parse a header value. For list-valued headers like `X-Forwarded-For`
    /// the first (client-most) entry wins.
    pub fn extract(&self, value: &str) -> Result<String, &'static str> {
        let first = value.split(',').next().unwrap_or_default().trim();
        if first.is_empty() {
            return Err("IP header is empty");
        }
        first
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

impl FromStr for IpExtractor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HeaderName::from_str(&s.to_ascii_lowercase())
            .map(Self::new)
            .map_err(|_| format!("Invalid header name: {}", s))
    }
}

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract client IP address based on configuration.
///
/// If `ip_extractor` is set, extracts IP from the configured header and returns an error
/// if the header is missing or invalid (does NOT fall back to SocketAddr).
///
/// If `ip_extractor` is None, uses the SocketAddr from ConnectInfo.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    ip_extractor: Option<&IpExtractor>,
) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let header_value = source
                .headers()
                .get(extractor.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(header_value)
        }
        None => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
