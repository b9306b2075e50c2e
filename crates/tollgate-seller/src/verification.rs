//! # Verification Engine
//!
//! The seller's cryptographic gauntlet. Two entry points:
//!
//! - [`Verifier::verify_payment_signature`] — detached Ed25519 check of the
//!   payment envelope against the payer's published DID document.
//! - [`Verifier::verify_presentation`] — the four-stage presentation chain:
//!   VP token signature (audience- and expiry-checked, nonce-bound to the
//!   challenge), per-credential token signatures (each against its own
//!   issuer's document), credential-set classification, and the policy gate.
//!
//! Every failure constructs its [`RejectReason`] at the point of failure.
//! The engine holds no mutable state: verifying the same artifacts twice
//! yields the same outcome.

use tollgate_core::{
    b64url_decode, CanonicalBytes, Did, DidUrl, PaymentEnvelope, PresentationClaims,
};
use tollgate_crypto::{
    decode_header, verify_token, verify_with_public_key, Signature, TokenError, VerifyOptions,
    VerifyingKey,
};
use tollgate_identity::{Credential, CredentialKind, DidDocument, IdentityRegistry};

use crate::challenge::Challenge;
use crate::events::{EventLog, LogStatus};
use crate::reject::RejectReason;

/// The credential payloads that survived the full chain, handed back to the
/// orchestrator for response assembly.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    /// The verified email credential.
    pub email: Credential,
    /// The verified age credential.
    pub age: Credential,
    /// The verified delegation credential.
    pub delegation: Credential,
}

/// Seller-side verification engine.
#[derive(Debug, Clone)]
pub struct Verifier {
    registry: IdentityRegistry,
}

impl Verifier {
    /// Create a verifier resolving DIDs through the given registry.
    pub fn new(registry: IdentityRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a DID, mapping absence to `UntrustedIssuer`.
    fn resolve_required(&self, did: &Did) -> Result<DidDocument, RejectReason> {
        self.registry
            .resolve_did(did)
            .map_err(|e| RejectReason::InvalidProof(format!("DID resolution failed: {e}")))?
            .ok_or_else(|| RejectReason::UntrustedIssuer(did.to_string()))
    }

    /// Select the verification key a `kid` names, with first-method
    /// fallback, and hand back a dalek key ready for token verification.
    fn verification_key(
        &self,
        document: &DidDocument,
        kid: Option<&DidUrl>,
    ) -> Result<VerifyingKey, RejectReason> {
        let method = match kid {
            Some(kid) => document.method_for_kid(kid),
            None => document.primary_method(),
        }
        .map_err(|_| {
            RejectReason::InvalidProof(format!("no verification method for DID {}", document.id))
        })?;
        method
            .public_key
            .to_verifying_key()
            .map_err(|e| RejectReason::InvalidProof(format!("unusable verification key: {e}")))
    }

    /// Verify the detached signature of a payment envelope.
    ///
    /// The payer DID resolves to a document; the envelope `kid` selects the
    /// verification method (first-method fallback); the signature must
    /// verify over the canonical JCS bytes of the payload.
    pub fn verify_payment_signature(
        &self,
        envelope: &PaymentEnvelope,
    ) -> Result<(), RejectReason> {
        let document = self.resolve_required(&envelope.payload.payer)?;
        let method = document.method_for_kid(&envelope.kid).map_err(|_| {
            RejectReason::InvalidProof(format!(
                "no verification method for DID {}",
                document.id
            ))
        })?;

        let canonical = CanonicalBytes::new(&envelope.payload)
            .map_err(|e| RejectReason::InvalidProof(format!("payload canonicalization: {e}")))?;
        let signature_bytes = b64url_decode(&envelope.signature).map_err(|_| {
            RejectReason::MalformedPayment("signature is not base64url".to_string())
        })?;
        let signature = Signature::from_slice(&signature_bytes).map_err(|_| {
            RejectReason::MalformedPayment("signature has wrong length".to_string())
        })?;

        verify_with_public_key(&canonical, &signature, &method.public_key)
            .map_err(|_| RejectReason::PaymentSignatureInvalid)
    }

    /// Run the full presentation chain against a challenge.
    ///
    /// `audience` is the seller origin the presentation must be bound to;
    /// `force_under18` is the live operator override, applied after the real
    /// age check so the rejection reason stays `AGE_POLICY_NOT_MET`.
    pub fn verify_presentation(
        &self,
        vp_token: &str,
        challenge: &Challenge,
        audience: &str,
        force_under18: bool,
        events: &EventLog,
    ) -> Result<VerifiedClaims, RejectReason> {
        let cid = challenge.challenge_id.as_str();
        events.record(cid, "vp.received", LogStatus::Info, "Verifiable presentation received", None);

        // Stage a: the presentation token itself.
        let header = decode_header(vp_token)
            .map_err(|e| RejectReason::InvalidProof(format!("presentation header: {e}")))?;
        events.record(
            cid,
            "vp.header",
            LogStatus::Info,
            format!("VP kid {}", header.kid.as_deref().unwrap_or("unknown")),
            None,
        );

        // The holder DID comes from the kid; a kid-less token can only be
        // attributed to the audience itself.
        let kid = match &header.kid {
            Some(raw) => Some(DidUrl::parse(raw).map_err(|_| {
                RejectReason::InvalidProof("presentation kid is not a DID URL".to_string())
            })?),
            None => None,
        };
        let holder_did = match &kid {
            Some(kid) => kid.did().clone(),
            None => Did::new(audience).map_err(|_| {
                RejectReason::InvalidProof("presentation has no kid to attribute".to_string())
            })?,
        };

        let document = self.resolve_required(&holder_did)?;
        let key = self.verification_key(&document, kid.as_ref())?;
        let claims_value = verify_token(
            vp_token,
            &key,
            &VerifyOptions {
                expected_audience: Some(audience.to_string()),
            },
        )
        .map_err(presentation_token_error)?;
        let claims: PresentationClaims = serde_json::from_value(claims_value)
            .map_err(|e| RejectReason::InvalidProof(format!("presentation claims: {e}")))?;

        if claims.nonce != challenge.challenge_id {
            return Err(RejectReason::NonceMismatch);
        }
        if claims.vp.verifiable_credential.is_empty() {
            return Err(RejectReason::InvalidProof(
                "presentation has no embedded credentials".to_string(),
            ));
        }

        // Stage b: every embedded credential, independently.
        let mut credentials = Vec::with_capacity(claims.vp.verifiable_credential.len());
        for token in &claims.vp.verifiable_credential {
            let credential = self.verify_credential_token(token)?;
            events.record(
                cid,
                "vc.verified",
                LogStatus::Success,
                format!(
                    "Verified {} issued by {}",
                    credential
                        .kind()
                        .map(|k| k.type_name())
                        .unwrap_or("credential"),
                    credential.issuer
                ),
                None,
            );
            credentials.push(credential);
        }

        // Stage c: exactly the required set must be present.
        let email = take_kind(&credentials, CredentialKind::Email)
            .ok_or(RejectReason::MissingCredential("email"))?;
        let age = take_kind(&credentials, CredentialKind::Age)
            .ok_or(RejectReason::MissingCredential("age"))?;
        let delegation = take_kind(&credentials, CredentialKind::Delegation)
            .ok_or(RejectReason::MissingCredential("delegation"))?;

        // Stage d: the policy gate, in fixed order — the first failing
        // condition names the rejection.
        let email_verified = email.subject_bool("email_verified") == Some(true);
        if !email_verified {
            return Err(RejectReason::EmailNotVerified);
        }
        let age_over_18 = age.subject_bool("age_over_18") == Some(true);
        if !age_over_18 {
            return Err(RejectReason::AgePolicyNotMet);
        }
        if force_under18 {
            // Operator-controlled demo override, after the real check.
            return Err(RejectReason::AgePolicyNotMet);
        }
        let holder_matches = delegation.subject_str("id") == Some(claims.vp.holder.as_str());
        if !holder_matches {
            return Err(RejectReason::HolderMismatch);
        }
        let owner_matches =
            delegation.subject_str("ownerEmail") == email.subject_str("email");
        if !owner_matches {
            return Err(RejectReason::DelegationOwnerMismatch);
        }

        events.record(
            cid,
            "policy.eval",
            LogStatus::Info,
            "Policy evaluation complete",
            Some(serde_json::json!({
                "email_verified": email_verified,
                "age_over_18": age_over_18,
                "holderMatchesDelegation": holder_matches,
                "delegationOwnerMatches": owner_matches,
                "enforcedUnder18": force_under18,
            })),
        );
        events.record(
            cid,
            "vp.verified",
            LogStatus::Success,
            "Presentation and credentials verified",
            None,
        );

        Ok(VerifiedClaims {
            email,
            age,
            delegation,
        })
    }

    /// Verify a single credential token against its own issuer's document.
    fn verify_credential_token(&self, token: &str) -> Result<Credential, RejectReason> {
        let header = decode_header(token)
            .map_err(|e| RejectReason::InvalidProof(format!("credential header: {e}")))?;
        let raw_kid = header.kid.ok_or_else(|| {
            RejectReason::InvalidProof("credential missing issuer kid".to_string())
        })?;
        let kid = DidUrl::parse(&raw_kid).map_err(|_| {
            RejectReason::InvalidProof("credential kid is not a DID URL".to_string())
        })?;

        let document = self.resolve_required(kid.did())?;
        let key = self.verification_key(&document, Some(&kid))?;
        let claims = verify_token(token, &key, &VerifyOptions::default())
            .map_err(presentation_token_error)?;

        let vc = claims.get("vc").cloned().ok_or_else(|| {
            RejectReason::InvalidProof("credential token has no vc claim".to_string())
        })?;
        serde_json::from_value(vc)
            .map_err(|e| RejectReason::InvalidProof(format!("credential body: {e}")))
    }
}

/// The first credential of a kind, cloned out of the verified set.
fn take_kind(credentials: &[Credential], kind: CredentialKind) -> Option<Credential> {
    credentials
        .iter()
        .find(|c| c.kind() == Some(kind))
        .cloned()
}

/// Map token-layer failures onto the rejection taxonomy.
fn presentation_token_error(error: TokenError) -> RejectReason {
    match error {
        TokenError::Expired => RejectReason::PresentationExpired,
        TokenError::AudienceMismatch { expected } => {
            RejectReason::InvalidProof(format!("token not bound to audience {expected}"))
        }
        other => RejectReason::InvalidProof(other.to_string()),
    }
}
