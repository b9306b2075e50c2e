//! End-to-end protocol runs against the assembled router: challenge
//! issuance, proof building with the agent crate, and redemption — the
//! happy path plus the failure modes that cross component boundaries.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use tollgate_agent::{build_payment_envelope, build_presentation};
use tollgate_core::{b64url_decode_json, ChallengeId, KeyAlias};
use tollgate_identity::{AgeInput, CredentialIssuer, DelegationInput, EmailInput};
use tollgate_seller::routes::{
    ChallengeBody, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, PRESENTATION_HEADER,
};
use tollgate_seller::state::AppState;

const HOST: &str = "seller.test";
const AUDIENCE: &str = "http://seller.test";

/// A seller plus an agent sharing one identity universe, as when both read
/// the same wallet home.
struct Harness {
    state: AppState,
    app: Router,
}

impl Harness {
    fn new() -> Self {
        let state = AppState::in_memory();
        let app = tollgate_seller::app(state.clone());
        Self { state, app }
    }

    /// Provision the three roles and issue the all-passing credential set.
    fn provision(&self, owner_email: &str, birth_date: &str) -> Vec<String> {
        let registry = &self.state.identity;
        let human = registry.ensure_did(KeyAlias::Human).unwrap();
        let agent = registry.ensure_did(KeyAlias::Agent).unwrap();
        registry.ensure_did(KeyAlias::Issuer).unwrap();

        let issuer = CredentialIssuer::new(registry.clone());
        let email = issuer
            .issue_email(EmailInput {
                subject_did: human.id.clone(),
                email: owner_email.into(),
                email_verified: true,
            })
            .unwrap();
        let age = issuer
            .issue_age(AgeInput {
                subject_did: human.id.clone(),
                birth_date: birth_date.into(),
            })
            .unwrap();
        let delegation = issuer
            .issue_delegation(DelegationInput {
                owner_did: human.id,
                agent_did: agent.id,
                owner_email: owner_email.into(),
                spend_cap_daily: None,
            })
            .unwrap();
        vec![email.token, age.token, delegation.token]
    }

    async fn request_challenge(&self) -> ChallengeBody {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/jobs")
                    .header("host", HOST)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        body_json(response).await
    }

    async fn redeem(&self, payment_header: &str, vp_token: &str) -> Response {
        self.app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/jobs")
                    .header("host", HOST)
                    .header(PAYMENT_HEADER, payment_header)
                    .header(PRESENTATION_HEADER, vp_token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Full proof build for a challenge: payment header + VP token.
    fn build_proofs(
        &self,
        challenge: &ChallengeBody,
        tokens: Vec<String>,
        amount: &str,
    ) -> (String, String) {
        let payment = build_payment_envelope(
            &self.state.identity,
            challenge.challenge_id.clone(),
            amount,
            challenge.asset.clone(),
        )
        .unwrap();
        let presentation = build_presentation(
            &self.state.identity,
            tokens,
            challenge.challenge_id.clone(),
            AUDIENCE,
        )
        .unwrap();
        (payment.header, presentation.token)
    }
}

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn full_protocol_run_settles_and_serves_resource() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    let challenge = harness.request_challenge().await;
    assert_eq!(challenge.amount, "0.01");

    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.01");
    let response = harness.redeem(&payment, &vp).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Settlement receipt rides the response header.
    let receipt_header = response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .expect("settlement header present")
        .to_str()
        .unwrap()
        .to_string();
    let receipt: serde_json::Value = b64url_decode_json(&receipt_header).unwrap();
    assert_eq!(receipt["status"], "settled");
    assert!(receipt["txId"].as_str().unwrap().starts_with("fac-"));
    assert!(receipt["settledAt"].is_string());

    // The protected resource echoes the verified email.
    let body: serde_json::Value = body_json(response).await;
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["contact"], "a@b.com");

    // And the log tells the whole story.
    let steps: Vec<String> = harness
        .state
        .events
        .snapshot()
        .into_iter()
        .map(|e| e.step)
        .collect();
    for expected in [
        "challenge.issued",
        "payment.signature",
        "payment.facilitator",
        "vp.verified",
        "redeem.success",
    ] {
        assert!(steps.contains(&expected.to_string()), "missing {expected}");
    }
}

#[tokio::test]
async fn wrong_amount_never_reaches_presentation_verification() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    let challenge = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.02");
    let response = harness.redeem(&payment, &vp).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "PAYMENT_TERMS_MISMATCH");

    // The facilitator rejected before the presentation chain started.
    let steps: Vec<String> = harness
        .state
        .events
        .snapshot()
        .into_iter()
        .map(|e| e.step)
        .collect();
    assert!(!steps.contains(&"vp.received".to_string()));
}

#[tokio::test]
async fn replayed_presentation_fails_nonce_binding() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    // VP built for challenge A, payment for challenge B.
    let challenge_a = harness.request_challenge().await;
    let challenge_b = harness.request_challenge().await;

    let presentation = build_presentation(
        &harness.state.identity,
        tokens,
        challenge_a.challenge_id.clone(),
        AUDIENCE,
    )
    .unwrap();
    let payment = build_payment_envelope(
        &harness.state.identity,
        challenge_b.challenge_id.clone(),
        "0.01",
        "USDC",
    )
    .unwrap();

    let response = harness.redeem(&payment.header, &presentation.token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "INVALID_NONCE");
}

#[tokio::test]
async fn duplicate_redemption_is_consumed() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    let challenge = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.01");

    let first = harness.redeem(&payment, &vp).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = harness.redeem(&payment, &vp).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = body_json(second).await;
    assert_eq!(body["error"], "CHALLENGE_CONSUMED");
}

#[tokio::test]
async fn force_under18_override_rejects_valid_proofs() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    // Flip the override through the console endpoint.
    let response = harness
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/console/toggle")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"forceUnder18":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let challenge = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.01");
    let response = harness.redeem(&payment, &vp).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "AGE_POLICY_NOT_MET");
}

#[tokio::test]
async fn under_age_principal_is_rejected() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2020-06-01");

    let challenge = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.01");
    let response = harness.redeem(&payment, &vp).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "AGE_POLICY_NOT_MET");
}

#[tokio::test]
async fn rejected_run_leaves_error_event() {
    let harness = Harness::new();
    let mut tokens = harness.provision("a@b.com", "2000-01-15");
    tokens.truncate(2); // drop the delegation credential

    let challenge = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&challenge, tokens, "0.01");
    let response = harness.redeem(&payment, &vp).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "MISSING_CREDENTIAL");

    let events = harness.state.events.snapshot();
    let last = events.last().unwrap();
    assert_eq!(last.step, "vp.credentials");
    assert_eq!(last.challenge_id, challenge.challenge_id.as_str());
}

#[tokio::test]
async fn corrected_retry_needs_a_fresh_challenge() {
    let harness = Harness::new();
    let tokens = harness.provision("a@b.com", "2000-01-15");

    // First attempt fails the policy gate (delegation missing).
    let challenge = harness.request_challenge().await;
    let mut partial = tokens.clone();
    partial.truncate(2);
    let (payment, vp) = harness.build_proofs(&challenge, partial, "0.01");
    let failed = harness.redeem(&payment, &vp).await;
    assert_eq!(failed.status(), StatusCode::BAD_REQUEST);

    // Retrying the same challenge with corrected proofs is refused; the
    // failure consumed it.
    let (payment, vp) = harness.build_proofs(&challenge, tokens.clone(), "0.01");
    let retried = harness.redeem(&payment, &vp).await;
    assert_eq!(retried.status(), StatusCode::CONFLICT);

    // A fresh challenge redeems cleanly.
    let fresh = harness.request_challenge().await;
    let (payment, vp) = harness.build_proofs(&fresh, tokens, "0.01");
    let ok = harness.redeem(&payment, &vp).await;
    assert_eq!(ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn payment_for_evicted_challenge_is_unknown() {
    let harness = Harness::new();
    harness.provision("a@b.com", "2000-01-15");
    harness
        .state
        .identity
        .ensure_did(KeyAlias::Agent)
        .unwrap();

    let payment = build_payment_envelope(
        &harness.state.identity,
        ChallengeId::from_string("c-long-gone"),
        "0.01",
        "USDC",
    )
    .unwrap();
    let response = harness.redeem(&payment.header, "a.b.c").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert_eq!(body["error"], "UNKNOWN_CHALLENGE");
}
