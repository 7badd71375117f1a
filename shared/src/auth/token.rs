//! Session token codec.
//!
//! Decodes the claims segment of a compact `header.claims.signature` token
//! and checks expiry. Every failure collapses to `None` at the public
//! boundary; callers only ever learn "session" or "no session".
//!
//! Signature verification is off unless an HS256 secret is supplied. Without
//! it the decoded claims are only as trustworthy as the cookie jar they came
//! from, which is fine for picking which page to render and nothing more.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::debug;

use crate::types::SessionClaims;

/// base64url that accepts the claims segment with or without `=` padding.
const CLAIMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a token was rejected. Only ever logged; [`TokenCodec::decode`] hides
/// it from callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("no session token")]
    Missing,

    #[error("token has no claims segment")]
    Malformed,

    #[error("claims segment is not valid base64url")]
    Base64,

    #[error("claims segment is not valid UTF-8")]
    Utf8,

    #[error("claims segment is not a claims document ({0:?} error)")]
    Json(serde_json::error::Category),

    #[error("token expired")]
    Expired,

    #[error("token signature rejected")]
    Signature,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Strip the wrapping a token picks up on its way into a cookie: whitespace,
/// one layer of JSON quotes, and one `Bearer ` prefix in any case.
///
/// Returns `None` when nothing is left.
pub fn normalize_token(raw: &str) -> Option<&str> {
    let mut token = raw.trim();

    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        token = &token[1..token.len() - 1];
    }

    if token
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "))
    {
        token = &token[7..];
    }

    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SignatureVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SignatureVerifier {
    fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry stays with the codec so verified and unverified tokens
        // expire by the same rule.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    fn verify(&self, token: &str) -> Result<(), TokenError> {
        jsonwebtoken::decode::<serde_json::Value>(token, &self.key, &self.validation)
            .map(|_| ())
            .map_err(|e| {
                debug!("Signature check failed: {}", e);
                TokenError::Signature
            })
    }
}

/// Decoder shared by the access guard and the session helpers.
#[derive(Clone, Default)]
pub struct TokenCodec {
    verifier: Option<SignatureVerifier>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("verifies_signatures", &self.verifies_signatures())
            .finish()
    }
}

impl TokenCodec {
    /// Decode-only codec: no signature verification.
    pub fn new() -> Self {
        Self { verifier: None }
    }

    /// Codec that also requires a valid HS256 signature under `secret`.
    pub fn with_hs256_secret(secret: &[u8]) -> Self {
        Self {
            verifier: Some(SignatureVerifier::hs256(secret)),
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verifier.is_some()
    }

    /// Decode the raw cookie value against the current clock.
    pub fn decode(&self, raw: Option<&str>) -> Option<SessionClaims> {
        self.decode_at(raw, now_millis())
    }

    /// Decode against an explicit clock (milliseconds since the Unix epoch).
    pub fn decode_at(&self, raw: Option<&str>, now_ms: i64) -> Option<SessionClaims> {
        match self.inspect(raw, now_ms) {
            Ok(claims) => Some(claims),
            Err(TokenError::Missing) => None,
            Err(reason) => {
                debug!("Session token rejected: {}", reason);
                None
            }
        }
    }

    /// Decode with the failure reason kept. Used for logging and tests; the
    /// guard goes through [`TokenCodec::decode`].
    pub fn inspect(&self, raw: Option<&str>, now_ms: i64) -> Result<SessionClaims, TokenError> {
        let token = raw.and_then(normalize_token).ok_or(TokenError::Missing)?;

        let payload = token.split('.').nth(1).ok_or(TokenError::Malformed)?;

        if let Some(verifier) = &self.verifier {
            verifier.verify(token)?;
        }

        let bytes = CLAIMS_ENGINE
            .decode(payload)
            .map_err(|_| TokenError::Base64)?;
        let json = String::from_utf8(bytes).map_err(|_| TokenError::Utf8)?;
        let claims: SessionClaims =
            serde_json::from_str(&json).map_err(|e| TokenError::Json(e.classify()))?;

        if claims.is_expired_at(now_ms) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Decode with the default, unverified codec.
pub fn decode(raw: Option<&str>) -> Option<SessionClaims> {
    TokenCodec::new().decode(raw)
}

/// Wall clock in milliseconds; a clock before the epoch reads as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
