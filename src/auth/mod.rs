//! Bearer token authentication.
//!
//! `AuthFilter` turns a bearer token into an `AuthContext`. The HTTP layer
//! stores it as a request extension and enforces roles per endpoint.

mod bearer;
mod filter;
mod ip;
mod types;

pub use bearer::bearer_token;
pub use filter::{AuthFilter, FilterOutcome};
pub use ip::{HasHeadersAndExtensions, IpExtractor, extract_client_ip};
pub use types::AuthContext;
