//! Access token verification.
//!
//! The signature algorithm is pinned by configuration. The `alg` header of an
//! incoming token is only compared against it, never used to pick a verifier.

use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::services::auth::{
    claims::{Claims, RawClaims, Scopes},
    jwks::KeyResolver,
};

const BEARER_SCHEME: &str = "bearer";
const MAX_LEEWAY_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::InvalidIssuer => Self::IssuerMismatch,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidToken => Self::Malformed("invalid jwt structure"),
            _ => Self::Malformed("undecodable token"),
        }
    }
}

/// Expected issuer/audience and the pinned algorithm.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    pub leeway_seconds: u64,
}

/// Stateless per-request token verification.
#[derive(Debug)]
pub struct TokenVerifier {
    keys: Arc<KeyResolver>,
    settings: VerifierSettings,
    // Signature-only validation; claim checks run against the caller's `now`.
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyResolver>, settings: VerifierSettings) -> Self {
        let mut validation = Validation::new(settings.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            keys,
            settings,
            validation,
        }
    }

    /// Verify a compact JWS (without the `Bearer ` prefix) at time `now`.
    pub async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, VerifyError> {
        if !is_compact_jws(token) {
            return Err(VerifyError::Malformed("expected three base64url segments"));
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| VerifyError::Malformed("undecodable header"))?;

        if header.alg != self.settings.algorithm {
            warn!(alg = ?header.alg, expected = ?self.settings.algorithm, "token algorithm rejected");
            return Err(VerifyError::InvalidSignature);
        }

        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(VerifyError::Malformed("missing kid"))?;

        let key = self.keys.get_signing_key(&kid).await.map_err(|err| {
            warn!(kid = %kid, error = %err, "no verification key for token");
            VerifyError::InvalidSignature
        })?;

        let data = jsonwebtoken::decode::<RawClaims>(token, key.decoding_key(), &self.validation)?;

        self.check_claims(data.claims, now)
    }

    /// Strip the `Bearer` scheme from an `Authorization` header value.
    pub fn strip_bearer(header: &str) -> Result<&str, VerifyError> {
        let (scheme, token) = header
            .trim()
            .split_once(' ')
            .ok_or(VerifyError::Malformed("missing bearer scheme"))?;

        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(VerifyError::Malformed("missing bearer scheme"));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(VerifyError::Malformed("empty bearer token"));
        }
        Ok(token)
    }

    fn check_claims(&self, raw: RawClaims, now: DateTime<Utc>) -> Result<Claims, VerifyError> {
        let leeway = Duration::seconds(self.settings.leeway_seconds.min(MAX_LEEWAY_SECONDS) as i64);

        let subject = raw
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(VerifyError::Malformed("missing sub"))?;
        let expiry = raw
            .exp
            .and_then(timestamp)
            .ok_or(VerifyError::Malformed("missing or invalid exp"))?;

        let issuer = raw.iss.ok_or(VerifyError::IssuerMismatch)?;
        if issuer != self.settings.issuer {
            return Err(VerifyError::IssuerMismatch);
        }

        let audience = raw.aud.ok_or(VerifyError::AudienceMismatch)?;
        if !audience.contains(&self.settings.audience) {
            return Err(VerifyError::AudienceMismatch);
        }

        if expiry
            .checked_add_signed(leeway)
            .is_some_and(|deadline| deadline <= now)
        {
            return Err(VerifyError::Expired);
        }

        if let Some(nbf) = raw.nbf.and_then(timestamp)
            && nbf.checked_sub_signed(leeway).is_some_and(|start| start > now)
        {
            return Err(VerifyError::NotYetValid);
        }

        let scopes = Scopes::from_claim(raw.scope.as_ref());

        Ok(Claims::new(
            subject,
            issuer,
            audience,
            expiry,
            scopes,
            raw.custom,
        ))
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn is_compact_jws(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Short, non-reversible token identifier for logs.
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(12);
    encoded
}
