//! # Identity Error Types

use thiserror::Error;
use tollgate_core::{Did, KeyAlias};

use crate::storage::StorageError;

/// Errors from key, DID, and credential operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// A keypair was required but is not in the store.
    #[error("missing keypair for alias {0}; provision the wallet first")]
    MissingKey(KeyAlias),

    /// A DID was required but no document is registered for the alias.
    #[error("missing DID for alias {0}; import a wallet bundle first")]
    MissingDid(KeyAlias),

    /// A DID document has no verification methods.
    #[error("no verification method found for DID {0}")]
    NoVerificationMethod(Did),

    /// A birth date did not parse as a calendar date.
    #[error("invalid birthDate: {0:?}")]
    InvalidBirthDate(String),

    /// The alias registry file is corrupt beyond repair.
    #[error("alias registry is corrupt and unrepairable: {0}")]
    CorruptAliasRegistry(String),

    /// Underlying byte-store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] tollgate_crypto::CryptoError),

    /// Token signing failure.
    #[error(transparent)]
    Token(#[from] tollgate_crypto::TokenError),

    /// Persisted record failed to serialize or parse.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identifier validation failure.
    #[error(transparent)]
    Validation(#[from] tollgate_core::ValidationError),
}
