//! # Rejection Taxonomy
//!
//! Every expected verification failure is a [`RejectReason`] variant,
//! constructed at the point of failure. The HTTP status, wire code, and
//! console step name all derive from the variant — the kind is never
//! reconstructed from a message string, and no expected failure escapes the
//! orchestrator as an opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Typed rejection of a protocol run.
#[derive(Error, Debug)]
pub enum RejectReason {
    /// The payment references a challenge this seller never issued (or one
    /// already evicted).
    #[error("unknown challenge")]
    UnknownChallenge,

    /// The payment envelope failed to decode or is missing signed parts.
    #[error("malformed payment: {0}")]
    MalformedPayment(String),

    /// The detached envelope signature did not verify.
    #[error("payment signature verification failed")]
    PaymentSignatureInvalid,

    /// The envelope terms disagree with the challenge terms.
    #[error("payment terms mismatch: {0}")]
    TermsMismatch(String),

    /// The challenge already reached a terminal state; duplicate
    /// resubmission.
    #[error("challenge already consumed")]
    ChallengeConsumed,

    /// The presentation nonce is not the challenge id being redeemed.
    #[error("presentation nonce does not match challenge")]
    NonceMismatch,

    /// The presentation holder is not the delegated agent.
    #[error("holder does not match delegation credential subject")]
    HolderMismatch,

    /// The email credential's address is unverified.
    #[error("email credential not verified")]
    EmailNotVerified,

    /// The age credential fails the policy, or the operator override is on.
    #[error("age policy not met")]
    AgePolicyNotMet,

    /// The delegation's owner email differs from the email credential.
    #[error("delegation owner email does not match email credential")]
    DelegationOwnerMismatch,

    /// A required credential kind is absent from the presentation.
    #[error("missing {0} credential")]
    MissingCredential(&'static str),

    /// A DID in the proof chain resolves to no known document.
    #[error("unknown DID: {0}")]
    UntrustedIssuer(String),

    /// The presentation token is past its expiry.
    #[error("presentation expired")]
    PresentationExpired,

    /// Catch-all for proofs that fail structural or signature checks.
    #[error("invalid proof: {0}")]
    InvalidProof(String),
}

/// Wire body of a rejection response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionBody {
    /// Machine-readable rejection code.
    pub error: String,
    /// Human-readable detail.
    pub detail: String,
}

impl RejectReason {
    /// The HTTP status this rejection maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownChallenge
            | Self::MalformedPayment(_)
            | Self::TermsMismatch(_)
            | Self::NonceMismatch
            | Self::MissingCredential(_)
            | Self::InvalidProof(_) => StatusCode::BAD_REQUEST,
            Self::PaymentSignatureInvalid | Self::PresentationExpired => StatusCode::UNAUTHORIZED,
            Self::HolderMismatch
            | Self::EmailNotVerified
            | Self::AgePolicyNotMet
            | Self::DelegationOwnerMismatch
            | Self::UntrustedIssuer(_) => StatusCode::FORBIDDEN,
            Self::ChallengeConsumed => StatusCode::CONFLICT,
        }
    }

    /// The machine-readable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownChallenge => "UNKNOWN_CHALLENGE",
            Self::MalformedPayment(_) => "MALFORMED_PAYMENT",
            Self::PaymentSignatureInvalid => "PAYMENT_SIGNATURE_INVALID",
            Self::TermsMismatch(_) => "PAYMENT_TERMS_MISMATCH",
            Self::ChallengeConsumed => "CHALLENGE_CONSUMED",
            Self::NonceMismatch => "INVALID_NONCE",
            Self::HolderMismatch => "HOLDER_MISMATCH",
            Self::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            Self::AgePolicyNotMet => "AGE_POLICY_NOT_MET",
            Self::DelegationOwnerMismatch => "DELEGATION_OWNER_MISMATCH",
            Self::MissingCredential(_) => "MISSING_CREDENTIAL",
            Self::UntrustedIssuer(_) => "UNTRUSTED_ISSUER",
            Self::PresentationExpired => "VP_EXPIRED",
            Self::InvalidProof(_) => "INVALID_PROOF",
        }
    }

    /// The console step this rejection is logged under.
    pub fn step(&self) -> &'static str {
        match self {
            Self::UnknownChallenge => "challenge.lookup",
            Self::MalformedPayment(_) => "payment.decode",
            Self::PaymentSignatureInvalid => "payment.signature",
            Self::TermsMismatch(_) | Self::ChallengeConsumed => "payment.facilitator",
            Self::NonceMismatch => "vp.nonce",
            Self::HolderMismatch => "vp.holder",
            Self::EmailNotVerified => "policy.email",
            Self::AgePolicyNotMet => "policy.age",
            Self::DelegationOwnerMismatch => "policy.delegation",
            Self::MissingCredential(_) => "vp.credentials",
            Self::UntrustedIssuer(_) => "issuer.resolve",
            Self::PresentationExpired => "vp.expiry",
            Self::InvalidProof(_) => "vp.error",
        }
    }
}

impl IntoResponse for RejectReason {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: self.code().to_string(),
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_mapping() {
        assert_eq!(RejectReason::UnknownChallenge.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RejectReason::PaymentSignatureInvalid.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RejectReason::PresentationExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(RejectReason::AgePolicyNotMet.status(), StatusCode::FORBIDDEN);
        assert_eq!(RejectReason::HolderMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(RejectReason::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            RejectReason::UntrustedIssuer("did:toll:x:y".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(RejectReason::ChallengeConsumed.status(), StatusCode::CONFLICT);
        assert_eq!(
            RejectReason::MissingCredential("age").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RejectReason::InvalidProof("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(RejectReason::NonceMismatch.code(), "INVALID_NONCE");
        assert_eq!(RejectReason::PresentationExpired.code(), "VP_EXPIRED");
        assert_eq!(RejectReason::AgePolicyNotMet.code(), "AGE_POLICY_NOT_MET");
    }

    #[test]
    fn steps_name_the_failing_stage() {
        assert_eq!(RejectReason::NonceMismatch.step(), "vp.nonce");
        assert_eq!(RejectReason::EmailNotVerified.step(), "policy.email");
        assert_eq!(RejectReason::ChallengeConsumed.step(), "payment.facilitator");
    }

    #[tokio::test]
    async fn response_body_carries_code_and_detail() {
        let response = RejectReason::MissingCredential("age").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: RejectionBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "MISSING_CREDENTIAL");
        assert!(body.detail.contains("age"));
    }
}
