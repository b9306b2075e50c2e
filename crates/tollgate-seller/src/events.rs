//! # Protocol Event Log
//!
//! A bounded, append-only ring of verification events backing the operator
//! console. Emission is fire-and-forget: it never blocks, never errors into
//! the protocol path, and mirrors every entry to `tracing` for operators
//! watching logs instead of the console.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tollgate_core::Timestamp;
use uuid::Uuid;

/// Maximum retained entries; the oldest entry drops when exceeded.
const MAX_ENTRIES: usize = 100;

/// Severity of a protocol event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// Progress note.
    Info,
    /// A stage completed.
    Success,
    /// A stage rejected the run.
    Error,
}

/// One protocol event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationLog {
    /// Random event id.
    pub id: String,
    /// The challenge this event belongs to (`"console"` for operator
    /// actions).
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
    /// Step name, e.g. `payment.signature`.
    pub step: String,
    /// Event severity.
    pub status: LogStatus,
    /// Human-readable detail.
    pub detail: String,
    /// When the event occurred.
    pub timestamp: Timestamp,
    /// Structured context, when a stage has any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Bounded in-memory event log.
///
/// Cheap to clone; all clones share the ring.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<RwLock<VecDeque<VerificationLog>>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event.
    pub fn record(
        &self,
        challenge_id: &str,
        step: &str,
        status: LogStatus,
        detail: impl Into<String>,
        meta: Option<serde_json::Value>,
    ) {
        let entry = VerificationLog {
            id: Uuid::new_v4().simple().to_string()[..10].to_string(),
            challenge_id: challenge_id.to_string(),
            step: step.to_string(),
            status,
            detail: detail.into(),
            timestamp: Timestamp::now(),
            meta,
        };

        match status {
            LogStatus::Error => {
                tracing::warn!(challenge_id, step, detail = %entry.detail, "protocol event")
            }
            _ => tracing::info!(challenge_id, step, detail = %entry.detail, "protocol event"),
        }

        let mut entries = self.entries.write();
        entries.push_back(entry);
        while entries.len() > MAX_ENTRIES {
            entries.pop_front();
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<VerificationLog> {
        self.entries.read().iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
