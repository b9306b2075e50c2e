//! # DID Documents
//!
//! The published record mapping a DID to its verification keys. Documents
//! are created once per role alias and never mutated; re-provisioning a role
//! creates a new document and repoints the alias.

use serde::{Deserialize, Serialize};
use tollgate_core::{Did, DidUrl, KeyAlias};
use tollgate_crypto::PublicKey;
use uuid::Uuid;

use crate::error::IdentityError;

/// One verification method inside a DID document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMethod {
    /// DID URL naming this method (`<did>#key-1`).
    pub id: DidUrl,
    /// Method type; always `Ed25519VerificationKey2020` here.
    #[serde(rename = "type")]
    pub method_type: String,
    /// The DID controlling this key.
    pub controller: Did,
    /// The Ed25519 public key, hex-encoded.
    #[serde(rename = "publicKeyHex")]
    pub public_key: PublicKey,
}

/// A published DID document.
///
/// Invariant: every `kid` referenced by a signed token must resolve to
/// exactly one method in here whose public key matches the signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDocument {
    /// The document's globally unique DID.
    pub id: Did,
    /// Verification keys published for this DID.
    #[serde(rename = "verificationMethod")]
    pub verification_method: Vec<VerificationMethod>,
    /// Method references usable for authentication.
    pub authentication: Vec<DidUrl>,
    /// Method references usable for assertions (credential signing).
    #[serde(rename = "assertionMethod")]
    pub assertion_method: Vec<DidUrl>,
}

impl DidDocument {
    /// Build a fresh document for a role alias around one Ed25519 key.
    ///
    /// The DID encodes the role (`did:toll:<role>:<random>`), and the single
    /// verification method is referenced from both relationship lists.
    pub fn generate(alias: KeyAlias, public_key: PublicKey) -> Self {
        let did = Did::new(format!("did:toll:{}:{}", alias, Uuid::new_v4().simple()))
            .expect("generated DID matches the grammar");
        let method_id =
            DidUrl::new(did.clone(), "key-1").expect("static fragment is non-empty");
        Self {
            id: did.clone(),
            verification_method: vec![VerificationMethod {
                id: method_id.clone(),
                method_type: "Ed25519VerificationKey2020".to_string(),
                controller: did,
                public_key,
            }],
            authentication: vec![method_id.clone()],
            assertion_method: vec![method_id],
        }
    }

    /// The document's first verification method.
    ///
    /// # Errors
    ///
    /// [`IdentityError::NoVerificationMethod`] when the list is empty.
    pub fn primary_method(&self) -> Result<&VerificationMethod, IdentityError> {
        self.verification_method
            .first()
            .ok_or_else(|| IdentityError::NoVerificationMethod(self.id.clone()))
    }

    /// Select the method matching `kid`, falling back to the first method
    /// when there is no exact match.
    ///
    /// The fallback mirrors wallet bundles that rotate fragments: the key is
    /// still the document's primary key even when the fragment drifted.
    pub fn method_for_kid(&self, kid: &DidUrl) -> Result<&VerificationMethod, IdentityError> {
        if let Some(exact) = self.verification_method.iter().find(|m| &m.id == kid) {
            return Ok(exact);
        }
        self.primary_method()
    }

    /// Relative store path of this document (`dids/<id with ':' → '_'>.json`).
    pub(crate) fn store_path(did: &Did) -> String {
        format!("dids/{}.json", did.as_str().replace(':', "_"))
    }
}
