//! # Payment Envelope Builder
//!
//! Signs a payment intent detached from any token format: the payload is
//! canonicalized (JCS) and signed with the agent's Ed25519 key, and the
//! whole envelope is base64url-wrapped for the `X-PAYMENT` header.
//!
//! The payer identity is never auto-provisioned here — paying with a key
//! that no published DID document backs would only produce an envelope the
//! seller must reject.

use rand_core::{OsRng, RngCore};
use tollgate_core::{
    b64url_encode, b64url_encode_json, CanonicalBytes, ChallengeId, KeyAlias, PaymentEnvelope,
    PaymentPayload, Timestamp,
};
use tollgate_identity::IdentityRegistry;

use crate::error::AgentError;

/// A built payment: the envelope and its wire form.
#[derive(Debug, Clone)]
pub struct BuiltPayment {
    /// The signed envelope.
    pub envelope: PaymentEnvelope,
    /// base64url(JSON envelope), ready for the `X-PAYMENT` header.
    pub header: String,
}

/// Build and sign a payment envelope for a challenge.
///
/// The payload carries a fresh 16-byte random nonce and the current
/// timestamp, binding the signature to this single attempt.
///
/// # Errors
///
/// [`AgentError::Identity`] when the agent alias has no keypair or DID.
pub fn build_payment_envelope(
    registry: &IdentityRegistry,
    challenge_id: ChallengeId,
    amount: impl Into<String>,
    asset: impl Into<String>,
) -> Result<BuiltPayment, AgentError> {
    let agent_doc = registry.require_did(KeyAlias::Agent)?;
    let keypair = registry.require_keypair(KeyAlias::Agent)?;
    let kid = agent_doc.primary_method()?.id.clone();

    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);

    let payload = PaymentPayload {
        challenge_id,
        amount: amount.into(),
        asset: asset.into(),
        payer: agent_doc.id.clone(),
        nonce: b64url_encode(nonce),
        timestamp: Timestamp::now(),
    };

    let canonical = CanonicalBytes::new(&payload)?;
    let signature = keypair.sign(&canonical);

    let envelope = PaymentEnvelope {
        payload,
        signature: b64url_encode(signature.as_bytes()),
        kid,
        tx_id: None,
    };
    let header = b64url_encode_json(&envelope)?;
    tracing::debug!(
        challenge_id = %envelope.payload.challenge_id,
        payer = %envelope.payload.payer,
        "built payment envelope"
    );
    Ok(BuiltPayment { envelope, header })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tollgate_core::b64url_decode_json;
    use tollgate_identity::{IdentityError, MemoryStorage};

    fn provisioned_registry() -> IdentityRegistry {
        let registry = IdentityRegistry::new(Arc::new(MemoryStorage::new()));
        registry.ensure_did(KeyAlias::Agent).unwrap();
        registry
    }

    #[test]
    fn envelope_signature_verifies_against_payer_document() {
        let registry = provisioned_registry();
        let built = build_payment_envelope(
            &registry,
            ChallengeId::from_string("c-test"),
            "0.01",
            "USDC",
        )
        .unwrap();

        let doc = registry
            .resolve_did(&built.envelope.payload.payer)
            .unwrap()
            .unwrap();
        let canonical = CanonicalBytes::new(&built.envelope.payload).unwrap();
        let sig_bytes = tollgate_core::b64url_decode(&built.envelope.signature).unwrap();
        let signature = tollgate_crypto::Signature::from_slice(&sig_bytes).unwrap();
        tollgate_crypto::verify_with_public_key(
            &canonical,
            &signature,
            &doc.primary_method().unwrap().public_key,
        )
        .expect("envelope signature must verify");
    }

    #[test]
    fn header_round_trips_to_the_same_envelope() {
        let registry = provisioned_registry();
        let built = build_payment_envelope(
            &registry,
            ChallengeId::from_string("c-test"),
            "0.01",
            "USDC",
        )
        .unwrap();

        let decoded: PaymentEnvelope = b64url_decode_json(&built.header).unwrap();
        assert_eq!(decoded.payload.nonce, built.envelope.payload.nonce);
        assert_eq!(decoded.signature, built.envelope.signature);
        assert_eq!(decoded.kid, built.envelope.kid);
    }

    #[test]
    fn nonces_are_fresh_per_envelope() {
        let registry = provisioned_registry();
        let a = build_payment_envelope(&registry, ChallengeId::from_string("c-1"), "0.01", "USDC")
            .unwrap();
        let b = build_payment_envelope(&registry, ChallengeId::from_string("c-1"), "0.01", "USDC")
            .unwrap();
        assert_ne!(a.envelope.payload.nonce, b.envelope.payload.nonce);
    }

    #[test]
    fn unprovisioned_agent_cannot_pay() {
        let registry = IdentityRegistry::new(Arc::new(MemoryStorage::new()));
        let result =
            build_payment_envelope(&registry, ChallengeId::from_string("c-1"), "0.01", "USDC");
        assert!(matches!(
            result,
            Err(AgentError::Identity(IdentityError::MissingDid(_)))
        ));
    }

    #[test]
    fn kid_belongs_to_payer_did() {
        let registry = provisioned_registry();
        let built = build_payment_envelope(
            &registry,
            ChallengeId::from_string("c-test"),
            "0.01",
            "USDC",
        )
        .unwrap();
        assert_eq!(built.envelope.kid.did(), &built.envelope.payload.payer);
    }
}
