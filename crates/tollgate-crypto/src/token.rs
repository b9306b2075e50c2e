//! # EdDSA Compact Tokens
//!
//! Signing and verification of the compact token format carrying verifiable
//! credentials and presentations: three unpadded base64url segments,
//! `header.payload.signature`, with header `{"alg":"EdDSA","typ":"JWT",kid}`
//! (RFC 7519 layout, Ed25519 signatures).
//!
//! The signing input is the ASCII `header.payload` string per RFC 7515 —
//! the one signature path in the workspace that is not JCS canonical bytes,
//! which is why it lives next to the raw signing primitive instead of on the
//! public `CanonicalBytes` surface.
//!
//! Registered claims handled here:
//!
//! - `iat` — always stamped at signing time.
//! - `exp` — stamped when a lifetime is given; enforced at verification.
//! - `nbf` — never stamped here (callers place it in their claims when the
//!   credential layer wants one); enforced at verification.
//! - `aud` — stamped from [`SignOptions::audience`]; enforced when the
//!   verifier states an expectation.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tollgate_core::{b64url_decode, b64url_encode};

use crate::ed25519::{self, Keypair, Signature};

/// Protected header of a compact token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm; always `EdDSA` for tokens minted here.
    pub alg: String,
    /// Token type; always `JWT`.
    pub typ: String,
    /// Key identifier (a DID URL) naming the verification method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Options controlling token signing.
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Key identifier placed in the protected header.
    pub kid: String,
    /// `aud` claim to stamp, if any.
    pub audience: Option<String>,
    /// Lifetime used to stamp `exp` relative to `iat`, if any.
    pub lifetime: Option<Duration>,
}

/// Options controlling token verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// When set, the token's `aud` claim must equal this value.
    pub expected_audience: Option<String>,
}

/// Errors from compact-token processing.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token is not three base64url JSON segments.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The claims value did not serialize to a JSON object.
    #[error("token claims must be a JSON object")]
    NonObjectClaims,

    /// The Ed25519 signature did not verify.
    #[error(transparent)]
    Signature(#[from] crate::error::CryptoError),

    /// The token's `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// The token's `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// The token's `aud` does not match the verifier's expectation.
    #[error("audience mismatch: expected {expected:?}")]
    AudienceMismatch {
        /// The audience the verifier required.
        expected: String,
    },
}

/// Sign claims into a compact token.
///
/// Stamps `iat` (and `exp`/`aud` per [`SignOptions`]) into the claims, then
/// signs `base64url(header).base64url(claims)` with the given keypair.
///
/// # Errors
///
/// [`TokenError::NonObjectClaims`] when the claims value is not a JSON
/// object; [`TokenError::Malformed`] when claim serialization fails.
pub fn sign_claims(
    claims: &impl Serialize,
    keypair: &Keypair,
    options: &SignOptions,
) -> Result<String, TokenError> {
    let mut payload = serde_json::to_value(claims)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    let object = payload
        .as_object_mut()
        .ok_or(TokenError::NonObjectClaims)?;

    let now = Utc::now().timestamp();
    object.insert("iat".into(), serde_json::json!(now));
    if let Some(lifetime) = options.lifetime {
        object.insert("exp".into(), serde_json::json!(now + lifetime.num_seconds()));
    }
    if let Some(aud) = &options.audience {
        object.insert("aud".into(), serde_json::json!(aud));
    }

    let header = TokenHeader {
        alg: "EdDSA".into(),
        typ: "JWT".into(),
        kid: Some(options.kid.clone()),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| TokenError::Malformed(e.to_string()))?;
    let payload_json =
        serde_json::to_vec(&payload).map_err(|e| TokenError::Malformed(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        b64url_encode(header_json),
        b64url_encode(payload_json)
    );
    let signature = keypair.sign_raw(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        b64url_encode(signature.as_bytes())
    ))
}

/// Decode a token's protected header without verifying anything.
///
/// Verification flows peek at the header first: the `kid` names the DID
/// whose document supplies the verification key.
pub fn decode_header(token: &str) -> Result<TokenHeader, TokenError> {
    let encoded = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TokenError::Malformed("empty header segment".into()))?;
    let bytes = b64url_decode(encoded)
        .map_err(|e| TokenError::Malformed(format!("header segment: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header JSON: {e}")))
}

/// Verify a compact token and return its claims.
///
/// Checks, in order: segment structure, Ed25519 signature over the signing
/// input, `exp`, `nbf`, and (when [`VerifyOptions::expected_audience`] is
/// set) `aud`.
pub fn verify_token(
    token: &str,
    verifying_key: &ed25519_dalek::VerifyingKey,
    options: &VerifyOptions,
) -> Result<serde_json::Value, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed(
            "expected three dot-separated segments".into(),
        ));
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(TokenError::Malformed("empty segment".into()));
    }

    let signature_bytes = b64url_decode(signature)
        .map_err(|e| TokenError::Malformed(format!("signature segment: {e}")))?;
    let signature = Signature::from_slice(&signature_bytes)?;

    let signing_input_len = header.len() + 1 + payload.len();
    ed25519::verify_raw(token[..signing_input_len].as_bytes(), &signature, verifying_key)?;

    let payload_bytes = b64url_decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload segment: {e}")))?;
    let claims: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenError::Malformed(format!("payload JSON: {e}")))?;

    let now = Utc::now().timestamp();
    if let Some(exp) = claims.get("exp").and_then(|v| v.as_i64()) {
        if now >= exp {
            return Err(TokenError::Expired);
        }
    }
    if let Some(nbf) = claims.get("nbf").and_then(|v| v.as_i64()) {
        if now < nbf {
            return Err(TokenError::NotYetValid);
        }
    }
    if let Some(expected) = &options.expected_audience {
        let aud = claims.get("aud").and_then(|v| v.as_str());
        if aud != Some(expected.as_str()) {
            return Err(TokenError::AudienceMismatch {
                expected: expected.clone(),
            });
        }
    }

    Ok(claims)
}
