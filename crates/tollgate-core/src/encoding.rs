//! # Wire Encoding — base64url
//!
//! Unpadded base64url (RFC 4648 §5) helpers used for every wire surface:
//! compact-token segments, the `X-PAYMENT` envelope header, and the
//! `X-PAYMENT-REQUIRED` / `X-PAYMENT-RESPONSE` response headers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EncodingError;

/// Encode bytes as unpadded base64url.
pub fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode unpadded base64url into bytes.
pub fn b64url_decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

/// Serialize a value to JSON and base64url-encode it, as used for the
/// payment envelope and challenge headers.
pub fn b64url_encode_json<T: Serialize>(value: &T) -> Result<String, EncodingError> {
    let json = serde_json::to_vec(value)?;
    Ok(b64url_encode(json))
}

/// Decode a base64url header value and parse the JSON inside.
pub fn b64url_decode_json<T: DeserializeOwned>(s: &str) -> Result<T, EncodingError> {
    let bytes = b64url_decode(s)?;
    Ok(serde_json::from_slice(&bytes)?)
}
