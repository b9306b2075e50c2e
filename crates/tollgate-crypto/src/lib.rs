//! # tollgate-crypto — Cryptographic Primitives for Tollgate
//!
//! Two building blocks sit here:
//!
//! - **Ed25519** signing and verification. Public signing accepts only
//!   [`CanonicalBytes`](tollgate_core::CanonicalBytes), so every detached
//!   signature in the protocol is computed over deterministic JCS bytes.
//! - **EdDSA compact tokens** (`header.payload.signature`, RFC 7519 layout)
//!   carrying verifiable credentials and presentations, with `exp`/`nbf`/
//!   `aud` enforcement at verification time.
//!
//! Private key material never implements `Serialize` and never appears in
//! `Debug` output; persistence goes through an explicit seed accessor.

pub mod ed25519;
pub mod error;
pub mod token;

// Re-export primary types. `VerifyingKey` comes straight from dalek so
// downstream crates never need a direct dalek dependency.
pub use ed25519::{verify, verify_with_public_key, Keypair, PublicKey, Signature};
pub use ed25519_dalek::VerifyingKey;
pub use error::CryptoError;
pub use token::{decode_header, sign_claims, verify_token, SignOptions, TokenError, TokenHeader, VerifyOptions};
