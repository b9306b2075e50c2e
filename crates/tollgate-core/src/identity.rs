//! # Identity Newtypes
//!
//! Identifier types for the protocol. Each identifier is a distinct type —
//! a [`ChallengeId`] cannot be passed where a [`Did`] is expected, and a key
//! reference is a structured [`DidUrl`] rather than a string to be split on
//! `#` at every call site.
//!
//! ## Validation
//!
//! [`Did`] and [`DidUrl`] validate their grammar at construction, including
//! during deserialization, so a malformed identifier arriving on the wire is
//! rejected before any verification logic runs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ValidationError;

/// W3C Decentralized Identifier.
///
/// Format: `did:<method>:<method-specific-id>`, method lowercase
/// alphanumeric, identifier non-empty.
///
/// Reference: <https://www.w3.org/TR/did-core/#did-syntax>
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did(String);

impl Did {
    /// Create a DID from a string, validating format.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidDid`] when the string does not match the
    /// `did:method:identifier` grammar.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let Some(rest) = s.strip_prefix("did:") else {
            return Err(ValidationError::InvalidDid(s.to_string()));
        };
        let Some((method, identifier)) = rest.split_once(':') else {
            return Err(ValidationError::InvalidDid(s.to_string()));
        };
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }
        if identifier.is_empty() {
            return Err(ValidationError::InvalidDid(s.to_string()));
        }
        Ok(())
    }

    /// The DID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DID method (between the first and second colons).
    pub fn method(&self) -> &str {
        let rest = &self.0[4..];
        let colon = rest.find(':').expect("validated at construction");
        &rest[..colon]
    }

    /// Everything after `did:method:`.
    pub fn method_specific_id(&self) -> &str {
        let rest = &self.0[4..];
        let colon = rest.find(':').expect("validated at construction");
        &rest[colon + 1..]
    }
}

impl std::fmt::Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// A DID URL naming one verification method: `<did>#<fragment>`.
///
/// This is the structured form of a token `kid`. Parsing it once at the
/// boundary replaces the string-splitting the original wire format invites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DidUrl {
    did: Did,
    fragment: String,
}

impl DidUrl {
    /// Build a DID URL from a validated DID and a non-empty fragment.
    pub fn new(did: Did, fragment: impl Into<String>) -> Result<Self, ValidationError> {
        let fragment = fragment.into();
        if fragment.is_empty() || fragment.contains('#') {
            return Err(ValidationError::InvalidDidUrl(format!("{did}#{fragment}")));
        }
        Ok(Self { did, fragment })
    }

    /// Parse a `did:method:id#fragment` string.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidDidUrl`] when the `#` separator or fragment
    /// is missing, or the DID part fails DID validation.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let Some((did_part, fragment)) = s.split_once('#') else {
            return Err(ValidationError::InvalidDidUrl(s.to_string()));
        };
        let did =
            Did::new(did_part).map_err(|_| ValidationError::InvalidDidUrl(s.to_string()))?;
        Self::new(did, fragment)
    }

    /// The DID portion.
    pub fn did(&self) -> &Did {
        &self.did
    }

    /// The fragment naming the verification method.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

impl std::fmt::Display for DidUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.did, self.fragment)
    }
}

impl Serialize for DidUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DidUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Role alias owning exactly one keypair and one DID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlias {
    /// The human principal delegating to the agent.
    Human,
    /// The autonomous agent acting as payer and presentation holder.
    Agent,
    /// The credential issuer attesting email and age claims.
    Issuer,
}

impl KeyAlias {
    /// The string form used in file names and DID identifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Agent => "agent",
            Self::Issuer => "issuer",
        }
    }
}

impl std::fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a seller-issued challenge.
///
/// Generated as `c-<32 hex chars>`; treated as opaque when it arrives in a
/// payment payload, since an unknown id is a protocol-level rejection rather
/// than a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(String);

impl ChallengeId {
    /// Generate a fresh random challenge identifier.
    pub fn generate() -> Self {
        Self(format!("c-{}", Uuid::new_v4().simple()))
    }

    /// Wrap an identifier received on the wire.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn did_accepts_well_formed() {
        assert!(Did::new("did:toll:agent:0011aabb").is_ok());
        assert!(Did::new("did:web:example.com").is_ok());
        assert!(Did::new("did:key:z6Mkhax").is_ok());
    }

    #[test]
    fn did_rejects_malformed() {
        assert!(Did::new("").is_err());
        assert!(Did::new("toll:agent:x").is_err());
        assert!(Did::new("did:").is_err());
        assert!(Did::new("did::x").is_err());
        assert!(Did::new("did:Toll:x").is_err());
        assert!(Did::new("did:toll:").is_err());
    }

    #[test]
    fn did_parts() {
        let did = Did::new("did:toll:issuer:deadbeef").unwrap();
        assert_eq!(did.method(), "toll");
        assert_eq!(did.method_specific_id(), "issuer:deadbeef");
    }

    #[test]
    fn did_serde_validates() {
        let ok: Result<Did, _> = serde_json::from_str(r#""did:toll:agent:ab12""#);
        assert!(ok.is_ok());
        let bad: Result<Did, _> = serde_json::from_str(r#""not a did""#);
        assert!(bad.is_err());
    }

    #[test]
    fn did_url_round_trip() {
        let url = DidUrl::parse("did:toll:agent:ab12#key-1").unwrap();
        assert_eq!(url.did().as_str(), "did:toll:agent:ab12");
        assert_eq!(url.fragment(), "key-1");
        assert_eq!(url.to_string(), "did:toll:agent:ab12#key-1");
    }

    #[test]
    fn did_url_rejects_missing_parts() {
        assert!(DidUrl::parse("did:toll:agent:ab12").is_err()); // no fragment
        assert!(DidUrl::parse("did:toll:agent:ab12#").is_err()); // empty fragment
        assert!(DidUrl::parse("#key-1").is_err()); // no did
        assert!(DidUrl::parse("nonsense#key-1").is_err());
    }

    #[test]
    fn challenge_id_has_prefix_and_is_unique() {
        let a = ChallengeId::generate();
        let b = ChallengeId::generate();
        assert!(a.as_str().starts_with("c-"));
        assert_ne!(a, b);
    }

    #[test]
    fn key_alias_strings() {
        assert_eq!(KeyAlias::Human.as_str(), "human");
        assert_eq!(KeyAlias::Agent.to_string(), "agent");
        assert_eq!(
            serde_json::to_string(&KeyAlias::Issuer).unwrap(),
            r#""issuer""#
        );
    }
}
