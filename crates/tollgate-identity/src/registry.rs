//! # Key & DID Registry
//!
//! Maps each role alias to an Ed25519 keypair and a published DID document,
//! persisting both through the byte store exactly once per alias.
//!
//! ## Layout
//!
//! ```text
//! keys/<alias>.key.json      keypair record (public key + seed, hex)
//! dids/aliases.json          alias → DID mapping (written atomically)
//! dids/<did ':'→'_'>.json    DID documents
//! ```
//!
//! ## Alias registry durability
//!
//! `aliases.json` is written via temp-file-then-rename, so new corruption
//! cannot occur. A best-effort recovery path remains for files written by
//! older wallets: the reader truncates to the last parseable JSON object
//! boundary, rewrites the repaired registry, and only surfaces an error when
//! no boundary parses.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tollgate_core::{Did, KeyAlias, Timestamp};
use tollgate_crypto::{Keypair, PublicKey};

use crate::did::DidDocument;
use crate::error::IdentityError;
use crate::storage::Storage;

const ALIASES_PATH: &str = "dids/aliases.json";

/// Persisted keypair record.
#[derive(Serialize, Deserialize)]
struct StoredKeypair {
    id: String,
    #[serde(rename = "publicKey")]
    public_key: PublicKey,
    seed: String,
    #[serde(rename = "createdAt")]
    created_at: Timestamp,
}

type AliasMap = BTreeMap<String, Did>;

/// The key & DID registry over an opaque byte store.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct IdentityRegistry {
    store: Arc<dyn Storage>,
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry").finish_non_exhaustive()
    }
}

impl IdentityRegistry {
    /// Create a registry over the given store.
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// Access the underlying store (credential persistence shares it).
    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    // -- Keypairs -----------------------------------------------------------

    fn key_path(alias: KeyAlias) -> String {
        format!("keys/{alias}.key.json")
    }

    /// Load the keypair for an alias; `Ok(None)` when not provisioned.
    pub fn load_keypair(&self, alias: KeyAlias) -> Result<Option<Keypair>, IdentityError> {
        let Some(bytes) = self.store.read(&Self::key_path(alias))? else {
            return Ok(None);
        };
        let record: StoredKeypair = serde_json::from_slice(&bytes)?;
        Ok(Some(Keypair::from_seed_hex(&record.seed)?))
    }

    /// Load the keypair for an alias, or generate and persist one.
    pub fn ensure_keypair(&self, alias: KeyAlias) -> Result<Keypair, IdentityError> {
        if let Some(existing) = self.load_keypair(alias)? {
            return Ok(existing);
        }
        let keypair = Keypair::generate();
        let record = StoredKeypair {
            id: alias.to_string(),
            public_key: keypair.public_key(),
            seed: keypair.seed_hex().to_string(),
            created_at: Timestamp::now(),
        };
        self.store
            .write(&Self::key_path(alias), &serde_json::to_vec_pretty(&record)?)?;
        tracing::info!(alias = %alias, "generated keypair");
        Ok(keypair)
    }

    /// Load the keypair for an alias, failing when absent.
    ///
    /// Used on code paths where auto-generation would mint a key nobody has
    /// published a DID for.
    pub fn require_keypair(&self, alias: KeyAlias) -> Result<Keypair, IdentityError> {
        self.load_keypair(alias)?
            .ok_or(IdentityError::MissingKey(alias))
    }

    // -- Alias registry -----------------------------------------------------

    fn read_aliases(&self) -> Result<AliasMap, IdentityError> {
        let Some(bytes) = self.store.read(ALIASES_PATH)? else {
            return Ok(AliasMap::new());
        };
        let raw = String::from_utf8_lossy(&bytes);
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(parse_err) => match repair_alias_json(&raw) {
                Some(repaired) => {
                    tracing::warn!("alias registry was corrupt; repaired and rewritten");
                    self.write_aliases(&repaired)?;
                    Ok(repaired)
                }
                None => Err(IdentityError::CorruptAliasRegistry(parse_err.to_string())),
            },
        }
    }

    fn write_aliases(&self, aliases: &AliasMap) -> Result<(), IdentityError> {
        self.store
            .write_atomic(ALIASES_PATH, &serde_json::to_vec_pretty(aliases)?)?;
        Ok(())
    }

    // -- DID documents ------------------------------------------------------

    /// Resolve a DID to its document; `Ok(None)` for unknown DIDs.
    pub fn resolve_did(&self, did: &Did) -> Result<Option<DidDocument>, IdentityError> {
        let Some(bytes) = self.store.read(&DidDocument::store_path(did))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// List every stored DID document.
    pub fn list_dids(&self) -> Result<Vec<DidDocument>, IdentityError> {
        let mut documents = Vec::new();
        for name in self.store.list_dir("dids")? {
            if !name.ends_with(".json") || name == "aliases.json" {
                continue;
            }
            let Some(bytes) = self.store.read(&format!("dids/{name}"))? else {
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "skipping unparseable DID document")
                }
            }
        }
        Ok(documents)
    }

    fn save_document(&self, document: &DidDocument) -> Result<(), IdentityError> {
        self.store.ensure_dir("dids")?;
        self.store.write(
            &DidDocument::store_path(&document.id),
            &serde_json::to_vec_pretty(document)?,
        )?;
        Ok(())
    }

    /// Load the DID document for an alias, or create, persist, and register
    /// one from the alias's keypair.
    pub fn ensure_did(&self, alias: KeyAlias) -> Result<DidDocument, IdentityError> {
        let mut aliases = self.read_aliases()?;
        if let Some(did) = aliases.get(alias.as_str()) {
            if let Some(doc) = self.resolve_did(did)? {
                return Ok(doc);
            }
        }

        let keypair = self.ensure_keypair(alias)?;
        let document = DidDocument::generate(alias, keypair.public_key());
        self.save_document(&document)?;
        aliases.insert(alias.as_str().to_string(), document.id.clone());
        self.write_aliases(&aliases)?;
        tracing::info!(alias = %alias, did = %document.id, "created DID document");
        Ok(document)
    }

    /// Load the DID document for an alias without ever creating one.
    ///
    /// Falls back to scanning stored documents for one whose id embeds
    /// `:<alias>:` (recovering wallets whose alias file was lost) and
    /// repoints the alias at the recovered document.
    pub fn require_did(&self, alias: KeyAlias) -> Result<DidDocument, IdentityError> {
        let mut aliases = self.read_aliases()?;
        if let Some(did) = aliases.get(alias.as_str()) {
            if let Some(doc) = self.resolve_did(did)? {
                return Ok(doc);
            }
        }

        let marker = format!(":{alias}:");
        if let Some(doc) = self
            .list_dids()?
            .into_iter()
            .find(|doc| doc.id.as_str().contains(&marker))
        {
            aliases.insert(alias.as_str().to_string(), doc.id.clone());
            self.write_aliases(&aliases)?;
            return Ok(doc);
        }

        Err(IdentityError::MissingDid(alias))
    }
}

/// Truncate to the last boundary where the content parses as a JSON object.
///
/// Walks `}` positions from the end toward the front; the first prefix that
/// parses wins. Returns `None` when no prefix parses.
fn repair_alias_json(raw: &str) -> Option<AliasMap> {
    let mut end = raw.len();
    while let Some(pos) = raw[..end].rfind('}') {
        if let Ok(map) = serde_json::from_str(&raw[..=pos]) {
            return Some(map);
        }
        end = pos;
    }
    None
}
