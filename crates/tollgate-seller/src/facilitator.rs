//! # Facilitator — Settlement Stub
//!
//! Confirms that a payment envelope satisfies a challenge's terms and mints
//! a settlement receipt. Pure and deterministic: no clock dependence beyond
//! the receipt timestamp, no external calls. A production deployment swaps
//! this for a real payment rail behind the same signature.

use serde::{Deserialize, Serialize};
use tollgate_core::{PaymentEnvelope, Timestamp};
use uuid::Uuid;

use crate::challenge::Challenge;
use crate::reject::RejectReason;

/// Terminal settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Payment accepted and settled.
    Settled,
    /// Payment rejected.
    Rejected,
}

/// Receipt for a settled payment, echoed to the agent in the
/// `X-PAYMENT-RESPONSE` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Settlement outcome.
    pub status: SettlementStatus,
    /// Transaction id: the envelope's, or a generated `fac-` id.
    #[serde(rename = "txId")]
    pub tx_id: String,
    /// When settlement happened.
    #[serde(rename = "settledAt")]
    pub settled_at: Timestamp,
}

/// Settle a payment envelope against a challenge.
///
/// # Errors
///
/// [`RejectReason::TermsMismatch`] when the envelope pays for a different
/// challenge or disagrees on amount or asset.
pub fn settle(
    challenge: &Challenge,
    envelope: &PaymentEnvelope,
) -> Result<SettlementResult, RejectReason> {
    let payload = &envelope.payload;
    if payload.challenge_id != challenge.challenge_id {
        return Err(RejectReason::TermsMismatch(format!(
            "payment is for challenge {}, not {}",
            payload.challenge_id, challenge.challenge_id
        )));
    }
    if payload.amount != challenge.amount || payload.asset != challenge.asset {
        return Err(RejectReason::TermsMismatch(format!(
            "expected {} {}, got {} {}",
            challenge.amount, challenge.asset, payload.amount, payload.asset
        )));
    }

    let tx_id = envelope
        .tx_id
        .clone()
        .unwrap_or_else(|| format!("fac-{}", &Uuid::new_v4().simple().to_string()[..10]));
    Ok(SettlementResult {
        status: SettlementStatus::Settled,
        tx_id,
        settled_at: Timestamp::now(),
    })
}
