//! # Protocol Orchestrator Routes
//!
//! `GET /jobs` is the whole protocol:
//!
//! - without proof headers, it issues a challenge and answers
//!   `402 Payment Required`;
//! - with `X-PAYMENT` and `X-PRESENTATION`, it runs payment verification,
//!   facilitator settlement (atomically consuming the challenge),
//!   presentation verification, and response assembly, in that order, with
//!   early exit on the first failure.
//!
//! Failures inside the chain are typed [`RejectReason`]s; the single catch
//! point here logs them and maps them onto HTTP. The console endpoints
//! expose the event log and the under-18 override to the operator.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tollgate_core::{b64url_decode_json, b64url_encode_json, ChallengeId, PaymentEnvelope};

use crate::events::{LogStatus, VerificationLog};
use crate::facilitator;
use crate::reject::RejectReason;
use crate::state::AppState;

/// Request header carrying the base64url payment envelope.
pub const PAYMENT_HEADER: &str = "x-payment";
/// Request header carrying the raw presentation token.
pub const PRESENTATION_HEADER: &str = "x-presentation";
/// Response header mirroring the 402 challenge body, base64url.
pub const PAYMENT_REQUIRED_HEADER: &str = "x-payment-required";
/// Response header carrying the base64url settlement receipt.
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Build the protocol router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs))
        .route("/console/state", get(console_state))
        .route("/console/toggle", post(console_toggle))
}

/// Wire body of a 402 challenge response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeBody {
    /// The challenge id to pay against.
    #[serde(rename = "challengeId")]
    pub challenge_id: ChallengeId,
    /// Required amount.
    pub amount: String,
    /// Required asset.
    pub asset: String,
    /// Claims the presentation must carry.
    pub claims: Vec<String>,
    /// Accepted presentation format.
    #[serde(rename = "vpFormat")]
    pub vp_format: String,
}

/// Operator console snapshot.
#[derive(Debug, Serialize)]
pub struct ConsoleState {
    /// Retained protocol events, oldest first.
    pub logs: Vec<VerificationLog>,
    /// Whether the under-18 override is active.
    #[serde(rename = "forceUnder18")]
    pub force_under18: bool,
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    #[serde(rename = "forceUnder18", default)]
    force_under18: bool,
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    #[serde(rename = "forceUnder18")]
    force_under18: bool,
}

/// GET /jobs — the protocol endpoint.
async fn jobs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let payment = header_str(&headers, PAYMENT_HEADER);
    let presentation = header_str(&headers, PRESENTATION_HEADER);
    let origin = request_origin(&headers);

    let (Some(payment), Some(presentation)) = (payment, presentation) else {
        return issue_challenge(&state);
    };

    match redeem(&state, payment, presentation, &origin) {
        Ok(response) => response,
        Err((challenge_id, reason)) => {
            state.events.record(
                &challenge_id,
                reason.step(),
                LogStatus::Error,
                reason.to_string(),
                Some(serde_json::json!({ "error": reason.code() })),
            );
            // Consume the challenge on post-lookup failures so a corrected
            // retry must start from a fresh challenge.
            if !matches!(
                &reason,
                RejectReason::UnknownChallenge
                    | RejectReason::ChallengeConsumed
                    | RejectReason::MalformedPayment(_)
            ) {
                state
                    .challenges
                    .record_rejection(&ChallengeId::from_string(challenge_id.clone()), reason.code());
            }
            reason.into_response()
        }
    }
}

/// Issue a fresh challenge and answer 402.
fn issue_challenge(state: &AppState) -> Response {
    let challenge = state.challenges.issue(
        state.config.amount.clone(),
        state.config.asset.clone(),
        state.config.claims.clone(),
        state.under18_enforced(),
    );
    let body = ChallengeBody {
        challenge_id: challenge.challenge_id.clone(),
        amount: challenge.amount.clone(),
        asset: challenge.asset.clone(),
        claims: challenge.claims.clone(),
        vp_format: challenge.vp_format.clone(),
    };

    state.events.record(
        challenge.challenge_id.as_str(),
        "challenge.issued",
        LogStatus::Info,
        "HTTP 402 challenge issued",
        Some(serde_json::json!({
            "raw": {
                "direction": "response",
                "status": 402,
                "body": serde_json::to_value(&body).unwrap_or(serde_json::Value::Null),
            }
        })),
    );

    let encoded = b64url_encode_json(&body).unwrap_or_default();
    (
        StatusCode::PAYMENT_REQUIRED,
        [(PAYMENT_REQUIRED_HEADER, encoded)],
        Json(body),
    )
        .into_response()
}

/// Run the verification chain for an authenticated request.
///
/// Errors carry the challenge id they belong to (`"unknown"` before the
/// envelope decodes) so the caller can log and consume correctly.
fn redeem(
    state: &AppState,
    payment_header: &str,
    vp_token: &str,
    origin: &str,
) -> Result<Response, (String, RejectReason)> {
    let envelope: PaymentEnvelope = b64url_decode_json(payment_header).map_err(|e| {
        (
            "unknown".to_string(),
            RejectReason::MalformedPayment(format!("invalid payment envelope: {e}")),
        )
    })?;
    let challenge_id = envelope.payload.challenge_id.clone();
    let cid = challenge_id.as_str().to_string();

    let challenge = state
        .challenges
        .get(&challenge_id)
        .ok_or_else(|| (cid.clone(), RejectReason::UnknownChallenge))?;

    state.events.record(
        &cid,
        "raw.request",
        LogStatus::Info,
        "Authenticated request received",
        Some(serde_json::json!({
            "raw": {
                "direction": "request",
                "headers": {
                    "x-payment": truncate_for_log(payment_header),
                    "x-presentation": truncate_for_log(vp_token),
                }
            }
        })),
    );
    state.events.record(
        &cid,
        "payment.received",
        LogStatus::Info,
        "Payment envelope received",
        Some(serde_json::json!({
            "envelope": {
                "kid": envelope.kid.to_string(),
                "payer": envelope.payload.payer.as_str(),
            }
        })),
    );

    // 1. Payment signature.
    state
        .verifier
        .verify_payment_signature(&envelope)
        .map_err(|reason| (cid.clone(), reason))?;
    state.events.record(
        &cid,
        "payment.signature",
        LogStatus::Success,
        "Payment signature verified",
        Some(serde_json::json!({
            "kid": envelope.kid.to_string(),
            "payer": envelope.payload.payer.as_str(),
        })),
    );

    // 2. Facilitator settlement, consuming the challenge atomically.
    let receipt =
        facilitator::settle(&challenge, &envelope).map_err(|reason| (cid.clone(), reason))?;
    state
        .challenges
        .try_settle(&challenge_id, receipt.clone())
        .map_err(|reason| (cid.clone(), reason))?;
    state.events.record(
        &cid,
        "payment.facilitator",
        LogStatus::Success,
        "Facilitator settled payment",
        Some(serde_json::json!({ "settlement": receipt })),
    );

    // 3. Presentation chain and policy gate.
    let outcome = state
        .verifier
        .verify_presentation(
            vp_token,
            &challenge,
            origin,
            state.under18_enforced(),
            &state.events,
        )
        .map_err(|reason| (cid.clone(), reason))?;

    // 4. Response assembly: the protected resource, contact bound to the
    // verified email subject.
    let contact = outcome
        .email
        .subject_str("email")
        .unwrap_or_default()
        .to_string();
    let body = serde_json::json!({
        "jobs": [
            {
                "id": "agentic-dev-001",
                "title": "Agent Workflow Engineer",
                "rate": "120 USDC/hr",
                "contact": contact,
            },
            {
                "id": "agentic-dev-002",
                "title": "Credential Integration Engineer",
                "rate": "110 USDC/hr",
                "contact": contact,
            },
        ]
    });
    state.events.record(
        &cid,
        "redeem.success",
        LogStatus::Success,
        "Proof validated and resource served",
        Some(serde_json::json!({
            "raw": { "direction": "response", "status": 200, "body": body }
        })),
    );

    let receipt_header = b64url_encode_json(&receipt).unwrap_or_default();
    Ok((
        StatusCode::OK,
        [(PAYMENT_RESPONSE_HEADER, receipt_header)],
        Json(body),
    )
        .into_response())
}

/// GET /console/state — event log snapshot plus the override flag.
async fn console_state(State(state): State<AppState>) -> Json<ConsoleState> {
    Json(ConsoleState {
        logs: state.events.snapshot(),
        force_under18: state.under18_enforced(),
    })
}

/// POST /console/toggle — flip the under-18 override.
async fn console_toggle(
    State(state): State<AppState>,
    Json(request): Json<ToggleRequest>,
) -> Json<ToggleResponse> {
    state.set_under18_enforced(request.force_under18);
    let (status, detail) = if request.force_under18 {
        (LogStatus::Info, "Under-18 failure enforced")
    } else {
        (LogStatus::Success, "Under-18 failure disabled")
    };
    state
        .events
        .record("console", "console.toggle", status, detail, None);
    Json(ToggleResponse {
        force_under18: request.force_under18,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// The origin presentations must be audience-bound to, derived from the
/// Host header the agent connected with.
fn request_origin(headers: &HeaderMap) -> String {
    let host = header_str(headers, "host").unwrap_or("localhost");
    format!("http://{host}")
}

fn truncate_for_log(value: &str) -> String {
    const MAX: usize = 80;
    if value.len() > MAX {
        format!("{}...", &value[..MAX])
    } else {
        value.to_string()
    }
}
