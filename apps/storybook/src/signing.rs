//! Request signing for the visual generation service.
//!
//! The scheme is structurally SigV4: a canonical request is hashed, bound to a
//! `date/region/service/request` credential scope, and signed with a key derived
//! by chaining HMAC-SHA256 from the secret key. Signing is a pure function of
//! its inputs, so a fixed timestamp yields a fixed signature.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::errors::BookError;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json";
/// Lower-cased, sorted, `;`-joined names of the headers covered by the signature.
pub const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";
const SCOPE_TERMINATOR: &str = "request";

/// Headers and intermediate values produced for one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub headers: Vec<(&'static str, String)>,
    pub canonical_timestamp: String,
    pub payload_hash: String,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn signature(&self) -> Option<&str> {
        self.header("Authorization")
            .and_then(|auth| auth.rsplit("Signature=").next())
    }
}

/// Holds the credential material and service coordinates for signing.
#[derive(Clone)]
pub struct RequestSigner {
    access_key: String,
    secret_key: String,
    region: String,
    service: String,
    host: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("service", &self.service)
            .field("host", &self.host)
            .finish()
    }
}

impl RequestSigner {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
        host: impl Into<String>,
    ) -> Result<Self, BookError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        if access_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(BookError::Configuration(
                "VOLC_ACCESS_KEY and VOLC_SECRET_KEY must both be set".to_string(),
            ));
        }
        Ok(Self {
            access_key,
            secret_key,
            region: region.into(),
            service: service.into(),
            host: host.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Signs one request. `query` pairs may be given in any order.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> SignedRequest {
        let x_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let payload_hash = sha256_hex(body);

        let canonical_headers = format!(
            "content-type:{CONTENT_TYPE}\nhost:{}\nx-content-sha256:{payload_hash}\nx-date:{x_date}\n",
            self.host
        );
        let method = method.to_ascii_uppercase();
        let query_string = canonical_query_string(query);
        let canonical_request = [
            method.as_str(),
            path,
            query_string.as_str(),
            canonical_headers.as_str(),
            SIGNED_HEADERS,
            payload_hash.as_str(),
        ]
        .join("\n");

        let credential_scope = format!(
            "{date_stamp}/{}/{}/{SCOPE_TERMINATOR}",
            self.region, self.service
        );
        let request_hash = sha256_hex(canonical_request.as_bytes());
        let string_to_sign = [
            ALGORITHM,
            x_date.as_str(),
            credential_scope.as_str(),
            request_hash.as_str(),
        ]
        .join("\n");

        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.access_key
        );

        SignedRequest {
            headers: vec![
                ("X-Date", x_date.clone()),
                ("Authorization", authorization),
                ("X-Content-Sha256", payload_hash.clone()),
                ("Content-Type", CONTENT_TYPE.to_string()),
            ],
            canonical_timestamp: x_date,
            payload_hash,
        }
    }

    /// date → region → service → "request", seeded with the secret key.
    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_sha256(self.secret_key.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
    }
}

/// Sorts pairs by key (then value) and percent-encodes both sides.
pub fn canonical_query_string(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}
