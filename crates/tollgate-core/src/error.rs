//! # Error Types
//!
//! Structured errors for the foundational crate. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in signed payloads. Monetary amounts
    /// travel as strings so that signer and verifier agree on every byte.
    #[error("float values are not permitted in canonical payloads; use a string or integer: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("canonical serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error validating an identifier at construction time.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The string is not a well-formed `did:method:identifier`.
    #[error("invalid DID: {0:?}")]
    InvalidDid(String),

    /// The string is not a well-formed `did#fragment` key reference.
    #[error("invalid DID URL: {0:?}")]
    InvalidDidUrl(String),
}

/// Error decoding a base64url wire value.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// The input is not valid unpadded base64url.
    #[error("invalid base64url: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded bytes are not the expected JSON shape.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
