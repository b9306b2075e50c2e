//! # Presentation Builder
//!
//! Bundles credential tokens into a verifiable presentation token: holder =
//! the agent DID, nonce = the challenge id, audience = the seller origin,
//! expiry five minutes out. The token is persisted as a run artifact under
//! `presentations/`.

use chrono::{Duration, Utc};
use tollgate_core::{ChallengeId, KeyAlias, PresentationBody, PresentationClaims};
use tollgate_crypto::{sign_claims, SignOptions};
use tollgate_identity::{IdentityError, IdentityRegistry};

use crate::error::AgentError;

const VP_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
const VP_LIFETIME_MINUTES: i64 = 5;

/// A built presentation: the token and where it was persisted.
#[derive(Debug, Clone)]
pub struct BuiltPresentation {
    /// The signed presentation token (`X-PRESENTATION` value).
    pub token: String,
    /// Store path of the persisted token artifact.
    pub path: String,
}

/// Build and sign a presentation over credential tokens.
///
/// Invariant: the `kid` in the token header belongs to the same DID as
/// `vp.holder` — both come from the agent alias's document here, and the
/// seller re-checks the relationship when verifying.
pub fn build_presentation(
    registry: &IdentityRegistry,
    credential_tokens: Vec<String>,
    challenge_id: ChallengeId,
    audience: impl Into<String>,
) -> Result<BuiltPresentation, AgentError> {
    let agent_doc = registry.ensure_did(KeyAlias::Agent)?;
    let keypair = registry.ensure_keypair(KeyAlias::Agent)?;
    let kid = agent_doc.primary_method()?.id.clone();

    let claims = PresentationClaims {
        vp: PresentationBody {
            context: vec![VP_CONTEXT.to_string()],
            presentation_type: vec!["VerifiablePresentation".to_string()],
            holder: agent_doc.id.clone(),
            verifiable_credential: credential_tokens,
        },
        nonce: challenge_id,
    };

    let token = sign_claims(
        &claims,
        &keypair,
        &SignOptions {
            kid: kid.to_string(),
            audience: Some(audience.into()),
            lifetime: Some(Duration::minutes(VP_LIFETIME_MINUTES)),
        },
    )?;

    let path = format!("presentations/vp-{}.jwt", Utc::now().timestamp_millis());
    let store = registry.store();
    store.ensure_dir("presentations").map_err(IdentityError::from)?;
    store
        .write(&path, token.as_bytes())
        .map_err(IdentityError::from)?;
    tracing::debug!(nonce = %claims.nonce, path = %path, "built presentation");

    Ok(BuiltPresentation { token, path })
}
