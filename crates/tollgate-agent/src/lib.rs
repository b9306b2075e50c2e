//! # tollgate-agent — Holder-Side Proof Builders
//!
//! The agent's half of the protocol: given a provisioned identity registry,
//! build the two artifacts a challenge demands —
//!
//! - a [`payment`] envelope: the payment payload signed detached over its
//!   canonical bytes, wrapped for the `X-PAYMENT` header;
//! - a [`presentation`]: credential tokens bundled into a signed,
//!   short-lived presentation token bound to the challenge nonce and the
//!   seller audience, for the `X-PRESENTATION` header.

pub mod error;
pub mod payment;
pub mod presentation;

pub use error::AgentError;
pub use payment::{build_payment_envelope, BuiltPayment};
pub use presentation::{build_presentation, BuiltPresentation};
