//! # tollgate-identity — Keys, DIDs, and Credentials
//!
//! The identity layer for both sides of the protocol. It owns:
//!
//! - the **byte store seam** ([`Storage`]) behind which all persistence
//!   hides — a path-addressed, read-after-write-consistent key-value store;
//! - the **key & DID registry** ([`IdentityRegistry`]) mapping the three
//!   role aliases (`human`, `agent`, `issuer`) to Ed25519 keypairs and
//!   published DID documents, including the alias registry with atomic
//!   writes and a legacy repair path;
//! - the **credential issuer** ([`CredentialIssuer`]) minting signed
//!   email, age, and delegation credentials as compact tokens.

pub mod credential;
pub mod did;
pub mod error;
pub mod registry;
pub mod storage;

pub use credential::{
    AgeInput, Credential, CredentialIssuer, CredentialKind, DelegationInput, EmailInput,
    IssuedCredential, Proof, StoredCredential,
};
pub use did::{DidDocument, VerificationMethod};
pub use error::IdentityError;
pub use registry::IdentityRegistry;
pub use storage::{FsStorage, MemoryStorage, Storage, StorageError};
