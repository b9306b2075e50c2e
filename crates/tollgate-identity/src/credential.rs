//! # Credential Issuance
//!
//! Builds and signs verifiable credentials as compact tokens and persists
//! them in the wallet store. Three kinds exist:
//!
//! - **Email** — `{id, email, email_verified}`, signed by the issuer key.
//! - **Age** — `{id, birthDate, age_over_18}`, signed by the issuer key;
//!   the over-18 flag is derived here, never supplied by the caller.
//! - **Delegation** — `{id: agent DID, capabilities, ownerEmail}`, signed by
//!   the human principal's key with the owner DID as credential issuer.
//!
//! Credentials are immutable once signed; a newer issuance supersedes, it
//! never updates.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tollgate_core::{Did, DidUrl, KeyAlias, Timestamp};
use tollgate_crypto::{sign_claims, Keypair, SignOptions};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::registry::IdentityRegistry;

const VC_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
const VCS_DIR: &str = "vcs";

/// Credential kinds the protocol understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Verified email address of the human principal.
    Email,
    /// Age attestation derived from a birth date.
    Age,
    /// Delegation from the human principal to the agent.
    Delegation,
}

impl CredentialKind {
    /// The entry this kind contributes to the VC `type` array.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Email => "EmailCredential",
            Self::Age => "AgeCredential",
            Self::Delegation => "AgentDelegationCredential",
        }
    }

    /// Short name used in store file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Age => "age",
            Self::Delegation => "delegation",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Proof object attached to an issued credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    /// Proof suite; always `Ed25519Signature2020`.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// When the proof was created.
    pub created: Timestamp,
    /// The verification method that signed.
    #[serde(rename = "verificationMethod")]
    pub verification_method: DidUrl,
    /// Proof purpose; always `assertionMethod`.
    #[serde(rename = "proofPurpose")]
    pub proof_purpose: String,
    /// The signed compact token carrying this credential.
    pub jwt: String,
}

/// A verifiable credential.
///
/// The subject stays a JSON value: its shape varies by kind and the policy
/// gate reads individual fields, so a rigid struct would only be unpacked
/// again at every use site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// JSON-LD context.
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    /// Type array: `["VerifiableCredential", <kind>]`.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// The issuing DID (the owner DID for delegation credentials).
    pub issuer: Did,
    /// Issuance time.
    #[serde(rename = "issuanceDate")]
    pub issuance_date: Timestamp,
    /// Credential id (`urn:uuid:<random>`).
    pub id: String,
    /// The claims about the subject.
    #[serde(rename = "credentialSubject")]
    pub credential_subject: serde_json::Value,
    /// Proof, present after signing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Credential {
    /// Classify by the `type` array; `None` for foreign credentials.
    pub fn kind(&self) -> Option<CredentialKind> {
        [
            CredentialKind::Email,
            CredentialKind::Age,
            CredentialKind::Delegation,
        ]
        .into_iter()
        .find(|kind| self.credential_type.iter().any(|t| t == kind.type_name()))
    }

    /// A string field of the credential subject.
    pub fn subject_str(&self, key: &str) -> Option<&str> {
        self.credential_subject.get(key)?.as_str()
    }

    /// A boolean field of the credential subject.
    pub fn subject_bool(&self, key: &str) -> Option<bool> {
        self.credential_subject.get(key)?.as_bool()
    }
}

/// Input for email credential issuance.
#[derive(Debug, Clone)]
pub struct EmailInput {
    /// The subject (the human principal's DID).
    pub subject_did: Did,
    /// The attested email address.
    pub email: String,
    /// Whether the address passed verification.
    pub email_verified: bool,
}

/// Input for age credential issuance.
#[derive(Debug, Clone)]
pub struct AgeInput {
    /// The subject (the human principal's DID).
    pub subject_did: Did,
    /// Birth date, `YYYY-MM-DD` or RFC 3339.
    pub birth_date: String,
}

/// Input for delegation credential issuance.
#[derive(Debug, Clone)]
pub struct DelegationInput {
    /// The delegating human principal's DID (becomes the issuer).
    pub owner_did: Did,
    /// The delegate agent's DID (becomes the subject).
    pub agent_did: Did,
    /// The owner's email, cross-checked against the email credential.
    pub owner_email: String,
    /// Daily spend cap capability; defaults to `"100 USDC"`.
    pub spend_cap_daily: Option<String>,
}

/// Result of issuing a credential.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// The signed compact token.
    pub token: String,
    /// The credential with proof attached.
    pub credential: Credential,
    /// Store path of the persisted record.
    pub path: String,
}

/// A credential record read back from the store.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    /// Credential id.
    pub id: String,
    /// Kind recovered from the file name, when recognizable.
    pub kind: Option<CredentialKind>,
    /// The signed compact token.
    pub token: String,
    /// The credential body.
    pub credential: Credential,
    /// Store path the record was read from.
    pub path: String,
}

/// Persisted shape of a credential record.
#[derive(Serialize, Deserialize)]
struct CredentialRecord {
    credential: Credential,
    jwt: String,
}

/// Token claims wrapping a credential.
#[derive(Serialize)]
struct VcClaims<'a> {
    iss: &'a Did,
    sub: &'a str,
    nbf: i64,
    vc: &'a Credential,
}

/// Issues and stores verifiable credentials.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    registry: IdentityRegistry,
}

impl CredentialIssuer {
    /// Create an issuer over the given registry.
    pub fn new(registry: IdentityRegistry) -> Self {
        Self { registry }
    }

    /// Issue an email credential signed by the `issuer` alias.
    pub fn issue_email(&self, input: EmailInput) -> Result<IssuedCredential, IdentityError> {
        let issuer_doc = self.registry.ensure_did(KeyAlias::Issuer)?;
        let keypair = self.registry.ensure_keypair(KeyAlias::Issuer)?;
        let subject = serde_json::json!({
            "id": input.subject_did,
            "email": input.email,
            "email_verified": input.email_verified,
        });
        self.issue(
            CredentialKind::Email,
            issuer_doc.id.clone(),
            &keypair,
            issuer_doc.primary_method()?.id.clone(),
            subject,
        )
    }

    /// Issue an age credential signed by the `issuer` alias.
    ///
    /// # Errors
    ///
    /// [`IdentityError::InvalidBirthDate`] when the date does not parse.
    pub fn issue_age(&self, input: AgeInput) -> Result<IssuedCredential, IdentityError> {
        let birth_date = parse_birth_date(&input.birth_date)
            .ok_or_else(|| IdentityError::InvalidBirthDate(input.birth_date.clone()))?;
        let over_18 = is_over_18(birth_date, Utc::now().date_naive());

        let issuer_doc = self.registry.ensure_did(KeyAlias::Issuer)?;
        let keypair = self.registry.ensure_keypair(KeyAlias::Issuer)?;
        let subject = serde_json::json!({
            "id": input.subject_did,
            "birthDate": birth_date.format("%Y-%m-%d").to_string(),
            "age_over_18": over_18,
        });
        self.issue(
            CredentialKind::Age,
            issuer_doc.id.clone(),
            &keypair,
            issuer_doc.primary_method()?.id.clone(),
            subject,
        )
    }

    /// Issue a delegation credential signed by the `human` alias, with the
    /// owner DID as the credential issuer.
    pub fn issue_delegation(
        &self,
        input: DelegationInput,
    ) -> Result<IssuedCredential, IdentityError> {
        let human_doc = self.registry.ensure_did(KeyAlias::Human)?;
        let keypair = self.registry.ensure_keypair(KeyAlias::Human)?;
        let subject = serde_json::json!({
            "id": input.agent_did,
            "capabilities": {
                "paymentProtocols": ["x402"],
                "spendCapDaily": input.spend_cap_daily.as_deref().unwrap_or("100 USDC"),
            },
            "ownerEmail": input.owner_email,
        });
        self.issue(
            CredentialKind::Delegation,
            input.owner_did,
            &keypair,
            human_doc.primary_method()?.id.clone(),
            subject,
        )
    }

    fn issue(
        &self,
        kind: CredentialKind,
        issuer: Did,
        signer: &Keypair,
        kid: DidUrl,
        subject: serde_json::Value,
    ) -> Result<IssuedCredential, IdentityError> {
        let now = Timestamp::now();
        let mut credential = Credential {
            context: vec![VC_CONTEXT.to_string()],
            credential_type: vec![
                "VerifiableCredential".to_string(),
                kind.type_name().to_string(),
            ],
            issuer,
            issuance_date: now,
            id: format!("urn:uuid:{}", Uuid::new_v4()),
            credential_subject: subject,
            proof: None,
        };

        let sub = credential
            .subject_str("id")
            .unwrap_or_default()
            .to_string();
        let claims = VcClaims {
            iss: &credential.issuer,
            sub: &sub,
            nbf: now.unix_seconds(),
            vc: &credential,
        };
        let token = sign_claims(
            &claims,
            signer,
            &SignOptions {
                kid: kid.to_string(),
                audience: None,
                lifetime: Some(Duration::minutes(10)),
            },
        )?;

        credential.proof = Some(Proof {
            proof_type: "Ed25519Signature2020".to_string(),
            created: now,
            verification_method: kid,
            proof_purpose: "assertionMethod".to_string(),
            jwt: token.clone(),
        });

        let path = self.persist(kind, &credential, &token)?;
        tracing::info!(kind = %kind, id = %credential.id, "issued credential");
        Ok(IssuedCredential {
            token,
            credential,
            path,
        })
    }

    fn persist(
        &self,
        kind: CredentialKind,
        credential: &Credential,
        token: &str,
    ) -> Result<String, IdentityError> {
        let slug = format!(
            "{}-{}-{}",
            kind.slug(),
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..6],
        );
        let path = format!("{VCS_DIR}/{slug}.json");
        let record = CredentialRecord {
            credential: credential.clone(),
            jwt: token.to_string(),
        };
        let store = self.registry.store();
        store.ensure_dir(VCS_DIR)?;
        store.write(&path, &serde_json::to_vec_pretty(&record)?)?;
        store.write(&format!("{VCS_DIR}/{slug}.jwt"), token.as_bytes())?;
        Ok(path)
    }

    /// Read every stored credential record.
    pub fn list_stored(&self) -> Result<Vec<StoredCredential>, IdentityError> {
        let store = self.registry.store();
        let mut records = Vec::new();
        for name in store.list_dir(VCS_DIR)? {
            if !name.ends_with(".json") {
                continue;
            }
            let path = format!("{VCS_DIR}/{name}");
            let Some(bytes) = store.read(&path)? else {
                continue;
            };
            let record: CredentialRecord = match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "skipping unparseable credential");
                    continue;
                }
            };
            let kind = record.credential.kind();
            records.push(StoredCredential {
                id: record.credential.id.clone(),
                kind,
                token: record.jwt,
                credential: record.credential,
                path,
            });
        }
        Ok(records)
    }

    /// The most recently issued credential of a kind, if any.
    pub fn load_by_kind(
        &self,
        kind: CredentialKind,
    ) -> Result<Option<StoredCredential>, IdentityError> {
        let mut matching: Vec<StoredCredential> = self
            .list_stored()?
            .into_iter()
            .filter(|record| record.kind == Some(kind))
            .collect();
        matching.sort_by_key(|record| record.credential.issuance_date);
        Ok(matching.pop())
    }
}

fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Whole-years comparison; the 18th birthday itself counts as over 18.
fn is_over_18(birth: NaiveDate, today: NaiveDate) -> bool {
    today.years_since(birth).is_some_and(|years| years >= 18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;
    use tollgate_crypto::{verify_token, VerifyOptions};

    fn issuer() -> (CredentialIssuer, IdentityRegistry) {
        let registry = IdentityRegistry::new(Arc::new(MemoryStorage::new()));
        (CredentialIssuer::new(registry.clone()), registry)
    }

    fn subject_did() -> Did {
        Did::new("did:toll:human:feedc0de").unwrap()
    }

    #[test]
    fn email_credential_round_trips_subject_claims() {
        let (issuer, registry) = issuer();
        let issued = issuer
            .issue_email(EmailInput {
                subject_did: subject_did(),
                email: "a@b.com".into(),
                email_verified: true,
            })
            .unwrap();

        // Verify the token with the issuer's published key.
        let issuer_doc = registry.require_did(KeyAlias::Issuer).unwrap();
        let key = issuer_doc
            .primary_method()
            .unwrap()
            .public_key
            .to_verifying_key()
            .unwrap();
        let claims = verify_token(&issued.token, &key, &VerifyOptions::default()).unwrap();

        assert_eq!(claims["vc"]["credentialSubject"]["email"], "a@b.com");
        assert_eq!(claims["vc"]["credentialSubject"]["email_verified"], true);
        assert_eq!(claims["sub"], subject_did().as_str());
        assert_eq!(issued.credential.kind(), Some(CredentialKind::Email));
        assert!(issued.credential.proof.is_some());
    }

    #[test]
    fn age_credential_derives_over_18() {
        let (issuer, _) = issuer();
        let twenty_years_ago = (Utc::now().date_naive() - chrono::Days::new(365 * 20))
            .format("%Y-%m-%d")
            .to_string();
        let issued = issuer
            .issue_age(AgeInput {
                subject_did: subject_did(),
                birth_date: twenty_years_ago,
            })
            .unwrap();
        assert_eq!(issued.credential.subject_bool("age_over_18"), Some(true));
    }

    #[test]
    fn age_credential_under_18_is_false() {
        let (issuer, _) = issuer();
        let ten_years_ago = (Utc::now().date_naive() - chrono::Days::new(365 * 10))
            .format("%Y-%m-%d")
            .to_string();
        let issued = issuer
            .issue_age(AgeInput {
                subject_did: subject_did(),
                birth_date: ten_years_ago,
            })
            .unwrap();
        assert_eq!(issued.credential.subject_bool("age_over_18"), Some(false));
    }

    #[test]
    fn eighteenth_birthday_counts_as_over_18() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        assert!(is_over_18(NaiveDate::from_ymd_opt(2008, 8, 7).unwrap(), today));
        assert!(!is_over_18(NaiveDate::from_ymd_opt(2008, 8, 8).unwrap(), today));
        assert!(is_over_18(NaiveDate::from_ymd_opt(2008, 8, 6).unwrap(), today));
    }

    #[test]
    fn invalid_birth_date_rejected() {
        let (issuer, _) = issuer();
        let result = issuer.issue_age(AgeInput {
            subject_did: subject_did(),
            birth_date: "not-a-date".into(),
        });
        assert!(matches!(result, Err(IdentityError::InvalidBirthDate(_))));
    }

    #[test]
    fn delegation_issued_by_owner_signed_by_human_key() {
        let (issuer, registry) = issuer();
        let agent_did = Did::new("did:toll:agent:ab12").unwrap();
        let owner_did = subject_did();

        let issued = issuer
            .issue_delegation(DelegationInput {
                owner_did: owner_did.clone(),
                agent_did: agent_did.clone(),
                owner_email: "a@b.com".into(),
                spend_cap_daily: None,
            })
            .unwrap();

        assert_eq!(issued.credential.issuer, owner_did);
        assert_eq!(issued.credential.subject_str("id"), Some(agent_did.as_str()));
        assert_eq!(
            issued.credential.credential_subject["capabilities"]["spendCapDaily"],
            "100 USDC"
        );

        // Signed by the human alias key, verifiable via its document.
        let human_doc = registry.require_did(KeyAlias::Human).unwrap();
        let key = human_doc
            .primary_method()
            .unwrap()
            .public_key
            .to_verifying_key()
            .unwrap();
        verify_token(&issued.token, &key, &VerifyOptions::default()).unwrap();
    }

    #[test]
    fn load_by_kind_returns_latest() {
        let (issuer, _) = issuer();
        issuer
            .issue_email(EmailInput {
                subject_did: subject_did(),
                email: "first@b.com".into(),
                email_verified: true,
            })
            .unwrap();
        issuer
            .issue_email(EmailInput {
                subject_did: subject_did(),
                email: "second@b.com".into(),
                email_verified: true,
            })
            .unwrap();

        let loaded = issuer.load_by_kind(CredentialKind::Email).unwrap().unwrap();
        // Same-second issuance: either is acceptable, but a record must load
        // and classify correctly.
        assert_eq!(loaded.kind, Some(CredentialKind::Email));
        assert!(loaded.credential.subject_str("email").unwrap().ends_with("@b.com"));

        assert!(issuer.load_by_kind(CredentialKind::Age).unwrap().is_none());
    }

    #[test]
    fn persisted_record_carries_both_forms() {
        let (issuer, registry) = issuer();
        let issued = issuer
            .issue_email(EmailInput {
                subject_did: subject_did(),
                email: "a@b.com".into(),
                email_verified: false,
            })
            .unwrap();

        let bytes = registry.store().read(&issued.path).unwrap().unwrap();
        let record: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(record["jwt"], issued.token.as_str());
        assert_eq!(record["credential"]["credentialSubject"]["email_verified"], false);

        let jwt_path = issued.path.replace(".json", ".jwt");
        let raw = registry.store().read(&jwt_path).unwrap().unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), issued.token);
    }
}
