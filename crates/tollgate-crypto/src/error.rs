//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from Ed25519 operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing or construction failed.
    #[error("key error: {0}")]
    KeyError(String),

    /// Signature bytes were the wrong length.
    #[error("invalid Ed25519 signature length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Hex decoding failed.
    #[error("hex decode error: {0}")]
    HexDecode(String),
}
