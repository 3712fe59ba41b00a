//! Ticket token decoding and verification.
//!
//! Tokens are compact JWTs signed with a shared HMAC secret. Decoding is a
//! pure function over token + secret: no store access, no side effects.

use crate::error::{Error, Result};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Decoded, verified payload of a ticket token.
///
/// The schema is validated at the decode boundary: missing or mistyped
/// required fields fail as [`Error::TokenInvalid`] rather than flowing an
/// open-ended structure through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Unique ticket identifier.
    pub ticket_id: String,
    /// Event this ticket admits to.
    pub event_id: String,
    /// Issuer identity; must match the gate's configured issuer.
    pub iss: String,
    /// Ticket validity deadline (seconds since epoch). Checked by the
    /// engine against scan time, independently of the signature expiry.
    pub valid_until: i64,
    /// Signature expiry (seconds since epoch), enforced during decode.
    pub exp: i64,
}

/// Verifies ticket tokens against the shared signing secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator for HS256 tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        // Gate decisions are made at the moment of the scan; no leeway.
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and verify a token, returning its claims.
    ///
    /// # Errors
    ///
    /// - [`Error::TokenExpired`] when the signature expiry has passed.
    /// - [`Error::TokenInvalid`] for any other signature, format or schema
    ///   failure.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => Error::TokenExpired,
                _ => Error::TokenInvalid(e.to_string()),
            })
    }
}
