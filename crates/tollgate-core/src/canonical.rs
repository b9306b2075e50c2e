//! # Canonical Serialization — JCS Signing Input
//!
//! Defines [`CanonicalBytes`], the only construction path for bytes that get
//! signed or verified anywhere in Tollgate.
//!
//! ## Security Invariant
//!
//! The inner buffer is private and the only constructor is
//! [`CanonicalBytes::new`], which rejects floats and then serializes through
//! `serde_jcs` (RFC 8785: sorted keys, compact separators, deterministic
//! number formatting). A payment payload signed by the agent and re-encoded
//! by the seller therefore canonicalizes to the same byte sequence, and the
//! "verifier serialized differently than the signer" failure mode cannot be
//! written.
//!
//! Floats are rejected outright: every monetary amount in the protocol is a
//! string, and float serialization is the one place JSON implementations
//! disagree.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Deterministic signing-input bytes produced by JCS canonicalization.
///
/// # Invariants
///
/// - The only constructor is [`CanonicalBytes::new`].
/// - The value tree contains no floats.
/// - Output uses sorted keys and compact separators (RFC 8785).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value into signing-input bytes.
    ///
    /// # Errors
    ///
    /// [`CanonicalizationError::FloatRejected`] if the value tree contains a
    /// float; [`CanonicalizationError::SerializationFailed`] if JSON or JCS
    /// serialization fails.
    pub fn new(value: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let tree = serde_json::to_value(value)?;
        reject_floats(&tree)?;
        let text = serde_jcs::to_string(&tree)?;
        Ok(Self(text.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the value tree and reject any number that is a pure float.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}
