//! # Protocol Wire Types
//!
//! The data model shared by both sides of the challenge–proof–settlement
//! exchange. The agent crate builds and signs these; the seller crate
//! decodes and verifies them. Field names follow the wire contract, so
//! serde renames are the source of truth for the JSON shape.

use serde::{Deserialize, Serialize};

use crate::identity::{ChallengeId, Did, DidUrl};
use crate::temporal::Timestamp;

/// The signed body of a payment.
///
/// One-shot: the nonce and timestamp bind the signature to a single
/// attempt, and `challenge_id` binds it to a single challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// The challenge being paid.
    #[serde(rename = "challengeId")]
    pub challenge_id: ChallengeId,
    /// Amount as a decimal string (never a float on the wire).
    pub amount: String,
    /// Asset code, e.g. `USDC`.
    pub asset: String,
    /// The paying agent's DID.
    pub payer: Did,
    /// Fresh random nonce, base64url.
    pub nonce: String,
    /// When the envelope was built.
    pub timestamp: Timestamp,
}

/// A signed payment: payload plus detached signature.
///
/// The signature covers the canonical JCS bytes of `payload` and travels
/// base64url-encoded; `kid` names the verification method that signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEnvelope {
    /// The signed payment body.
    pub payload: PaymentPayload,
    /// Detached Ed25519 signature, base64url.
    pub signature: String,
    /// Verification method that produced the signature.
    pub kid: DidUrl,
    /// Pre-existing transaction id to honor at settlement, if any.
    #[serde(rename = "txId", skip_serializing_if = "Option::is_none", default)]
    pub tx_id: Option<String>,
}

/// The `vp` object inside a presentation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationBody {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// Type array: `["VerifiablePresentation"]`.
    #[serde(rename = "type")]
    pub presentation_type: Vec<String>,
    /// The presenting holder's DID.
    pub holder: Did,
    /// Embedded credential tokens, each independently signed.
    #[serde(rename = "verifiableCredential")]
    pub verifiable_credential: Vec<String>,
}

/// Claims of a presentation token as built by the holder.
///
/// `aud`, `iat`, and `exp` are stamped by the token layer at signing time;
/// the nonce carries the challenge binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationClaims {
    /// The presentation body.
    pub vp: PresentationBody,
    /// Challenge binding: must equal the challenge id being redeemed.
    pub nonce: ChallengeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_names() {
        let payload = PaymentPayload {
            challenge_id: ChallengeId::from_string("c-1"),
            amount: "0.01".into(),
            asset: "USDC".into(),
            payer: Did::new("did:toll:agent:ab12").unwrap(),
            nonce: "n".into(),
            timestamp: Timestamp::parse("2026-08-07T00:00:00Z").unwrap(),
        };
        let envelope = PaymentEnvelope {
            payload,
            signature: "sig".into(),
            kid: DidUrl::parse("did:toll:agent:ab12#key-1").unwrap(),
            tx_id: None,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["payload"]["challengeId"], "c-1");
        assert_eq!(json["kid"], "did:toll:agent:ab12#key-1");
        assert!(json.get("txId").is_none());
    }

    #[test]
    fn envelope_rejects_malformed_identifiers() {
        let bad_kid = serde_json::json!({
            "payload": {
                "challengeId": "c-1", "amount": "0.01", "asset": "USDC",
                "payer": "did:toll:agent:ab12", "nonce": "n",
                "timestamp": "2026-08-07T00:00:00Z"
            },
            "signature": "sig",
            "kid": "no-fragment-here"
        });
        assert!(serde_json::from_value::<PaymentEnvelope>(bad_kid).is_err());

        let bad_payer = serde_json::json!({
            "payload": {
                "challengeId": "c-1", "amount": "0.01", "asset": "USDC",
                "payer": "not a did", "nonce": "n",
                "timestamp": "2026-08-07T00:00:00Z"
            },
            "signature": "sig",
            "kid": "did:toll:agent:ab12#key-1"
        });
        assert!(serde_json::from_value::<PaymentEnvelope>(bad_payer).is_err());
    }

    #[test]
    fn presentation_claims_round_trip() {
        let claims = PresentationClaims {
            vp: PresentationBody {
                context: vec!["https://www.w3.org/2018/credentials/v1".into()],
                presentation_type: vec!["VerifiablePresentation".into()],
                holder: Did::new("did:toll:agent:ab12").unwrap(),
                verifiable_credential: vec!["a.b.c".into()],
            },
            nonce: ChallengeId::from_string("c-9"),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["vp"]["type"][0], "VerifiablePresentation");
        assert_eq!(json["nonce"], "c-9");
        let back: PresentationClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back.vp.holder.as_str(), "did:toll:agent:ab12");
    }
}
