//! # Challenge Registry
//!
//! In-memory registry of issued challenges, keyed by challenge id.
//!
//! ## Single-use discipline
//!
//! A challenge moves `Issued → Settled` exactly once, via
//! [`ChallengeRegistry::try_settle`]: the read-validate-write runs under one
//! write lock, so a duplicate resubmission observes the terminal state and
//! is rejected instead of silently overwriting the settlement.
//!
//! ## Eviction
//!
//! The registry sweeps opportunistically on issue: terminal challenges are
//! evicted a grace period after consumption, pending ones a longer period
//! after issuance. Replays of evicted challenges surface as
//! `UNKNOWN_CHALLENGE`, same as a restarted seller.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tollgate_core::{ChallengeId, Timestamp};

use crate::facilitator::SettlementResult;
use crate::reject::RejectReason;

/// Lifecycle state of a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ChallengeState {
    /// Issued, awaiting proof.
    Issued,
    /// Payment settled; terminal.
    Settled {
        /// The settlement receipt.
        receipt: SettlementResult,
    },
    /// Rejected; terminal.
    Rejected {
        /// The rejection code recorded.
        code: String,
        /// When the rejection was recorded.
        at: Timestamp,
    },
}

impl ChallengeState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Issued)
    }
}

/// A seller-issued challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Unique challenge id (`c-<random>`).
    #[serde(rename = "challengeId")]
    pub challenge_id: ChallengeId,
    /// Required payment amount, decimal string.
    pub amount: String,
    /// Required payment asset.
    pub asset: String,
    /// Claim names the presentation must satisfy.
    pub claims: Vec<String>,
    /// Accepted presentation format; always `jwt_vp`.
    #[serde(rename = "vpFormat")]
    pub vp_format: String,
    /// Issuance time.
    #[serde(rename = "createdAt")]
    pub created_at: Timestamp,
    /// Operator override active when the challenge was issued.
    #[serde(rename = "forceUnder18")]
    pub force_under18: bool,
    /// Lifecycle state.
    pub state: ChallengeState,
}

impl Challenge {
    #[cfg(test)]
    pub(crate) fn issue_for_test(amount: &str, asset: &str) -> Self {
        Self {
            challenge_id: ChallengeId::generate(),
            amount: amount.into(),
            asset: asset.into(),
            claims: vec!["email_verified".into(), "age_over_18".into()],
            vp_format: "jwt_vp".into(),
            created_at: Timestamp::now(),
            force_under18: false,
            state: ChallengeState::Issued,
        }
    }
}

/// In-memory challenge store with atomic consumption and TTL sweep.
///
/// Cheap to clone; all clones share the map.
#[derive(Debug, Clone)]
pub struct ChallengeRegistry {
    challenges: Arc<RwLock<HashMap<String, Challenge>>>,
    pending_ttl: Duration,
    terminal_ttl: Duration,
}

impl Default for ChallengeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeRegistry {
    /// Create a registry with default TTLs (pending 15 minutes, terminal
    /// 5 minutes).
    pub fn new() -> Self {
        Self::with_ttls(Duration::minutes(15), Duration::minutes(5))
    }

    /// Create a registry with explicit TTLs.
    pub fn with_ttls(pending_ttl: Duration, terminal_ttl: Duration) -> Self {
        Self {
            challenges: Arc::new(RwLock::new(HashMap::new())),
            pending_ttl,
            terminal_ttl,
        }
    }

    /// Issue and store a new challenge, sweeping expired entries first.
    pub fn issue(
        &self,
        amount: impl Into<String>,
        asset: impl Into<String>,
        claims: Vec<String>,
        force_under18: bool,
    ) -> Challenge {
        let challenge = Challenge {
            challenge_id: ChallengeId::generate(),
            amount: amount.into(),
            asset: asset.into(),
            claims,
            vp_format: "jwt_vp".to_string(),
            created_at: Timestamp::now(),
            force_under18,
            state: ChallengeState::Issued,
        };
        let mut map = self.challenges.write();
        self.sweep_locked(&mut map);
        map.insert(challenge.challenge_id.as_str().to_string(), challenge.clone());
        challenge
    }

    /// Look up a challenge by id.
    pub fn get(&self, id: &ChallengeId) -> Option<Challenge> {
        self.challenges.read().get(id.as_str()).cloned()
    }

    /// Atomically consume a challenge: `Issued → Settled`.
    ///
    /// # Errors
    ///
    /// [`RejectReason::UnknownChallenge`] when no such challenge exists;
    /// [`RejectReason::ChallengeConsumed`] when it already reached a
    /// terminal state.
    pub fn try_settle(
        &self,
        id: &ChallengeId,
        receipt: SettlementResult,
    ) -> Result<(), RejectReason> {
        let mut map = self.challenges.write();
        let challenge = map
            .get_mut(id.as_str())
            .ok_or(RejectReason::UnknownChallenge)?;
        if challenge.state.is_terminal() {
            return Err(RejectReason::ChallengeConsumed);
        }
        challenge.state = ChallengeState::Settled { receipt };
        Ok(())
    }

    /// Record a rejection, consuming the challenge.
    ///
    /// Also covers the settled-then-presentation-failed path: the challenge
    /// ends terminal either way, so a replay cannot redeem it.
    pub fn record_rejection(&self, id: &ChallengeId, code: &str) {
        if let Some(challenge) = self.challenges.write().get_mut(id.as_str()) {
            challenge.state = ChallengeState::Rejected {
                code: code.to_string(),
                at: Timestamp::now(),
            };
        }
    }

    /// Number of retained challenges.
    pub fn len(&self) -> usize {
        self.challenges.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.challenges.read().is_empty()
    }

    fn sweep_locked(&self, map: &mut HashMap<String, Challenge>) {
        let now = *Timestamp::now().as_datetime();
        map.retain(|_, challenge| {
            let expired = match &challenge.state {
                ChallengeState::Issued => {
                    now.signed_duration_since(*challenge.created_at.as_datetime())
                        > self.pending_ttl
                }
                ChallengeState::Settled { receipt } => {
                    now.signed_duration_since(*receipt.settled_at.as_datetime())
                        > self.terminal_ttl
                }
                ChallengeState::Rejected { at, .. } => {
                    now.signed_duration_since(*at.as_datetime()) > self.terminal_ttl
                }
            };
            if expired {
                tracing::debug!(challenge_id = %challenge.challenge_id, "evicting expired challenge");
            }
            !expired
        });
    }
}
