//! # Application State
//!
//! Shared state for the Axum orchestrator. Everything inside is cheap to
//! clone (`Arc` internals); the only cross-request mutable pieces are the
//! challenge registry, the event log, and the operator's under-18 override,
//! each with its own single-writer discipline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tollgate_identity::{FsStorage, IdentityRegistry, MemoryStorage};

use crate::challenge::ChallengeRegistry;
use crate::events::EventLog;
use crate::verification::Verifier;

/// Seller configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Price of the protected resource, decimal string.
    pub amount: String,
    /// Asset the price is denominated in.
    pub asset: String,
    /// Claim names challenges demand.
    pub claims: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            amount: "0.01".to_string(),
            asset: "USDC".to_string(),
            claims: vec!["email_verified".to_string(), "age_over_18".to_string()],
        }
    }
}

/// Shared application state handed to every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Issued challenges awaiting consumption.
    pub challenges: ChallengeRegistry,
    /// Bounded protocol event log.
    pub events: EventLog,
    /// Operator-controlled under-18 rejection override.
    pub force_under18: Arc<AtomicBool>,
    /// Identity registry the verifier resolves DIDs through.
    pub identity: IdentityRegistry,
    /// The verification engine.
    pub verifier: Verifier,
    /// Configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Create state around an existing identity registry.
    pub fn new(identity: IdentityRegistry, config: AppConfig) -> Self {
        Self {
            challenges: ChallengeRegistry::new(),
            events: EventLog::new(),
            force_under18: Arc::new(AtomicBool::new(false)),
            verifier: Verifier::new(identity.clone()),
            identity,
            config,
        }
    }

    /// State over a filesystem wallet home.
    pub fn with_home(home: impl Into<std::path::PathBuf>, config: AppConfig) -> Self {
        let registry = IdentityRegistry::new(Arc::new(FsStorage::new(home.into())));
        Self::new(registry, config)
    }

    /// Fully in-memory state for tests and demos.
    pub fn in_memory() -> Self {
        let registry = IdentityRegistry::new(Arc::new(MemoryStorage::new()));
        Self::new(registry, AppConfig::default())
    }

    /// Read the operator override.
    pub fn under18_enforced(&self) -> bool {
        self.force_under18.load(Ordering::Relaxed)
    }

    /// Set the operator override.
    pub fn set_under18_enforced(&self, value: bool) {
        self.force_under18.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_resource_terms() {
        let config = AppConfig::default();
        assert_eq!(config.amount, "0.01");
        assert_eq!(config.asset, "USDC");
        assert_eq!(config.claims, vec!["email_verified", "age_over_18"]);
    }

    #[test]
    fn in_memory_state_starts_clean() {
        let state = AppState::in_memory();
        assert!(state.challenges.is_empty());
        assert!(state.events.is_empty());
        assert!(!state.under18_enforced());
    }

    #[test]
    fn override_toggle_round_trip() {
        let state = AppState::in_memory();
        state.set_under18_enforced(true);
        assert!(state.under18_enforced());
        state.set_under18_enforced(false);
        assert!(!state.under18_enforced());
    }

    #[test]
    fn clones_share_the_override() {
        let state = AppState::in_memory();
        let clone = state.clone();
        clone.set_under18_enforced(true);
        assert!(state.under18_enforced());
    }
}
