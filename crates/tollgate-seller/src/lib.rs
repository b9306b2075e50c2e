//! # tollgate-seller — Seller-Side Protocol Engine
//!
//! The seller's half of the challenge–proof–settlement protocol:
//!
//! - [`challenge`] — in-memory challenge registry with atomic consumption
//!   and TTL eviction;
//! - [`verification`] — payment-signature and presentation verification,
//!   ending in the multi-credential policy gate;
//! - [`facilitator`] — the deterministic settlement stub standing in for a
//!   payment rail;
//! - [`reject`] — the typed rejection taxonomy mapped onto HTTP;
//! - [`events`] — the bounded protocol event log feeding the operator
//!   console;
//! - [`routes`] — the Axum orchestrator composing all of the above into the
//!   `/jobs` request cycle.
//!
//! ## Request flow
//!
//! ```text
//! GET /jobs (no proof headers)  → 402 + challenge
//! GET /jobs (X-PAYMENT + X-PRESENTATION)
//!     → payment signature → facilitator settle (atomic consume)
//!     → presentation chain → policy gate
//!     → 200 + resource + X-PAYMENT-RESPONSE, or typed rejection
//! ```

pub mod challenge;
pub mod events;
pub mod facilitator;
pub mod reject;
pub mod routes;
pub mod state;
pub mod verification;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
///
/// Health probes stay outside the protocol router so they never interact
/// with challenge state.
pub fn app(state: AppState) -> Router {
    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new()
        .merge(health)
        .merge(routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe — 200 whenever the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — 200 once the router is serving.
async fn readiness() -> &'static str {
    "ready"
}
