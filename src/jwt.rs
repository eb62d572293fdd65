//! Access token signing and verification.
//!
//! Tokens are HS256 JWTs carrying the subject email, the role claim and the
//! issue/expiry times. Verification is a pure function of the secret and the
//! clock: it never looks at the blacklist.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::db::UserRole;

/// Default access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// JWT ID, makes every issued token string distinct
    pub jti: String,
    /// Subject (user email)
    pub sub: String,
    /// User role
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// What a successful verification tells the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub identity: String,
    pub role: UserRole,
    /// Expiry in Unix seconds.
    pub expires_at: u64,
}

/// Result of issuing an access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Signs and verifies access tokens with a process-wide symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
    clock: SharedClock,
}

impl TokenCodec {
    /// Create a codec with the given secret and token lifetime.
    pub fn new(secret: &[u8], ttl_secs: u64, clock: SharedClock) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
            clock,
        }
    }

    /// Issue a token for an identity and role.
    pub fn issue(&self, identity: &str, role: UserRole) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now_secs();
        let exp = now.saturating_add(self.ttl_secs);

        let claims = AccessClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: identity.to_string(),
            role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            duration: self.ttl_secs,
        })
    }

    /// Check structure, signature and expiry.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let claims = self.decode(token)?;

        if claims.exp <= self.clock.now_secs() {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            identity: claims.sub,
            role: claims.role,
            expires_at: claims.exp,
        })
    }

    /// Decode and check the signature, but let the caller judge expiry.
    fn decode(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is checked against the injected clock in `verify`.
        validation.validate_exp = false;

        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Malformed)
    }
}

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    /// Bad structure or bad signature
    #[error("Failed to decode token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    Expired,
}
