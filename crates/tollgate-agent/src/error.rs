//! # Agent Error Types

use thiserror::Error;

/// Errors from holder-side proof building.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Identity registry failure (missing keys, storage, ...).
    #[error(transparent)]
    Identity(#[from] tollgate_identity::IdentityError),

    /// Token signing failure.
    #[error(transparent)]
    Token(#[from] tollgate_crypto::TokenError),

    /// Payment payload failed to canonicalize.
    #[error(transparent)]
    Canonicalization(#[from] tollgate_core::CanonicalizationError),

    /// Envelope failed to serialize for the wire.
    #[error(transparent)]
    Encoding(#[from] tollgate_core::EncodingError),
}
