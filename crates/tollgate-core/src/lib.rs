#![deny(missing_docs)]

//! # tollgate-core — Foundational Types for Tollgate
//!
//! Tollgate is a challenge–proof–settlement protocol: a seller gates a
//! resource behind an HTTP 402 challenge, and an agent redeems it with a
//! signed payment envelope plus a verifiable presentation about its human
//! principal. This crate holds the types every other crate builds on. It has
//! no internal dependencies — only `serde`, `serde_json`, `serde_jcs`,
//! `thiserror`, `chrono`, `uuid`, and `base64` from the ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtypes for identifiers.** A [`Did`], a [`DidUrl`] and a
//!    [`ChallengeId`] are distinct types; handler code cannot confuse a key
//!    identifier with the DID it belongs to.
//!
//! 2. **[`CanonicalBytes`] is the sole path to signing input.** Every
//!    detached signature in the protocol is computed over bytes produced by
//!    `CanonicalBytes::new()`, which applies float rejection before RFC 8785
//!    (JCS) serialization. Signers and verifiers cannot disagree on byte
//!    layout because neither can produce bytes any other way.
//!
//! 3. **Structured errors.** `thiserror` enums throughout; no
//!    `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod canonical;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use encoding::{b64url_decode, b64url_decode_json, b64url_encode, b64url_encode_json};
pub use error::{CanonicalizationError, EncodingError, ValidationError};
pub use identity::{ChallengeId, Did, DidUrl, KeyAlias};
pub use protocol::{PaymentEnvelope, PaymentPayload, PresentationBody, PresentationClaims};
pub use temporal::Timestamp;
