//! Request signing.
//!
//! Every request carries a `stamp` (Unix seconds), a `sig` and the public
//! `token`. The signature is HMAC-SHA1 keyed with the private secret over the
//! decimal stamp, base64 encoded and then percent-encoded. The server
//! recomputes it and judges the stamp's freshness; nothing is validated here.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::types::Params;

/// API credentials: the public token and the private secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    secret: String,
}

impl Credentials {
    /// Create credentials from the public token and private secret.
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }

    /// The public token sent with every request.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Compute the `sig` value for a stamp.
    pub fn sign(&self, stamp: i64) -> String {
        signature(self.secret.as_bytes(), stamp)
    }

    /// Append `stamp`, `sig` and `token` to the business parameters.
    pub fn envelope(&self, mut params: Params, stamp: i64) -> Params {
        params.push("stamp", stamp.to_string());
        params.push("sig", self.sign(stamp));
        params.push("token", self.token.clone());
        params
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Compute HMAC-SHA1 of the input data with the given key.
///
/// # Arguments
/// * `key` - The HMAC key bytes.
/// * `data` - The message bytes to authenticate.
///
/// # Returns
/// A 20-byte HMAC-SHA1 tag.
pub fn sha1_hmac(key: &[u8], data: &[u8]) -> [u8; 20] {
    type HmacSha1 = Hmac<Sha1>;
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Signature for `stamp` under `secret`, ready to be placed in a request.
///
/// # Returns
/// `percent_encode(base64(hmac_sha1(secret, decimal(stamp))))`.
pub fn signature(secret: &[u8], stamp: i64) -> String {
    let tag = sha1_hmac(secret, stamp.to_string().as_bytes());
    let encoded = BASE64.encode(tag);
    url::form_urlencoded::byte_serialize(encoded.as_bytes()).collect()
}
