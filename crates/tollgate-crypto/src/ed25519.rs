//! # Ed25519 Signing and Verification
//!
//! Key and signature newtypes for the payment and presentation protocol.
//!
//! ## Security Invariant
//!
//! - The public `sign`/`verify` surface accepts `&CanonicalBytes` only, so
//!   detached protocol signatures are always computed over JCS bytes. The
//!   raw-byte path exists solely for the compact-token module in this crate,
//!   where the signing input is the RFC 7515 `header.payload` string.
//! - [`Keypair`] does not implement `Serialize`, and its `Debug` output is
//!   redacted. Persistence goes through [`Keypair::seed`], which hands the
//!   caller a 32-byte seed to store deliberately.
//!
//! ## Serde
//!
//! Public keys and signatures serialize as lowercase hex strings.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tollgate_core::CanonicalBytes;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// An Ed25519 public key (32 bytes), hex-encoded in JSON.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

/// An Ed25519 signature (64 bytes), hex-encoded in JSON.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

/// An Ed25519 key pair for signing.
///
/// Deliberately not `Serialize`: key material leaves this type only through
/// [`Keypair::seed`].
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl PublicKey {
    /// Wrap raw public key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex_decode(hex.trim())?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyError("public key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Convert into a dalek verifying key.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}…)", hex_encode(&self.0[..4]))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice, checking length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// The raw 64 bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        let bytes = hex_decode(hex.trim()).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}…)", hex_encode(&self.0[..4]))
    }
}

impl Keypair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let mut csprng = rand_core::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Rebuild a key pair from a stored 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte seed, zeroized on drop.
    ///
    /// This is the single escape hatch for persistence; callers own the
    /// decision to write it somewhere.
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// The seed rendered as lowercase hex, zeroized on drop.
    pub fn seed_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex_encode(&*self.seed()))
    }

    /// Rebuild a key pair from a stored hex seed.
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(hex_decode(hex.trim())?);
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::KeyError("seed must be 32 bytes".into()))?;
        Ok(Self::from_seed(&seed))
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign canonical bytes.
    ///
    /// Signing input must be `&CanonicalBytes`; arbitrary byte signing is
    /// confined to the token module.
    pub fn sign(&self, data: &CanonicalBytes) -> Signature {
        self.sign_raw(data.as_bytes())
    }

    /// Sign raw bytes. Token signing input only.
    pub(crate) fn sign_raw(&self, data: &[u8]) -> Signature {
        Signature(self.signing_key.sign(data).to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair(<private>)")
    }
}

/// Verify an Ed25519 signature over canonical bytes.
pub fn verify(
    data: &CanonicalBytes,
    signature: &Signature,
    verifying_key: &ed25519_dalek::VerifyingKey,
) -> Result<(), CryptoError> {
    verify_raw(data.as_bytes(), signature, verifying_key)
}

/// Verify over raw bytes. Token verification input only.
pub(crate) fn verify_raw(
    data: &[u8],
    signature: &Signature,
    verifying_key: &ed25519_dalek::VerifyingKey,
) -> Result<(), CryptoError> {
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key
        .verify(data, &sig)
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
}

/// Verify using a [`PublicKey`] instead of a dalek key.
pub fn verify_with_public_key(
    data: &CanonicalBytes,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), CryptoError> {
    verify(data, signature, &public_key.to_verifying_key()?)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, CryptoError> {
    if hex.len() % 2 != 0 {
        return Err(CryptoError::HexDecode("odd length".into()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| CryptoError::HexDecode(format!("at position {i}: {e}")))
        })
        .collect()
}
