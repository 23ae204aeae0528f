//! Request signing for Azure Event Hubs and Blob Storage.
//!
//! Event Hubs accepts a Shared Access Signature derived from a named policy
//! key. Blob Storage accepts Shared Key authorization over a canonical
//! description of each request. Both are HMAC-SHA256.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_base64(key: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Shared access policy for an Event Hubs namespace or entity.
#[derive(Clone)]
pub struct SasKey {
    pub key_name: String,
    key: Vec<u8>,
}

impl SasKey {
    /// The policy key is used as raw UTF-8 bytes, not base64-decoded.
    pub fn new(key_name: impl Into<String>, key: impl AsRef<str>) -> Self {
        Self {
            key_name: key_name.into(),
            key: key.as_ref().as_bytes().to_vec(),
        }
    }

    /// Build an `Authorization` header value for `resource_uri` valid until
    /// `expiry_unix_secs`.
    pub fn token(&self, resource_uri: &str, expiry_unix_secs: u64) -> String {
        let encoded_uri = urlencoding::encode(resource_uri);
        let string_to_sign = format!("{encoded_uri}\n{expiry_unix_secs}");
        let signature = hmac_base64(&self.key, string_to_sign.as_bytes());
        format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            encoded_uri,
            urlencoding::encode(&signature),
            expiry_unix_secs,
            self.key_name
        )
    }
}

impl std::fmt::Debug for SasKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasKey")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

/// Storage account key for Shared Key authorization.
#[derive(Clone)]
pub struct SharedKeyCredential {
    pub account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    /// `key` is the already base64-decoded account key.
    pub fn new(account: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            account: account.into(),
            key,
        }
    }

    /// `Authorization` header value for a request described by `string_to_sign`.
    pub fn authorization(&self, string_to_sign: &str) -> String {
        format!(
            "SharedKey {}:{}",
            self.account,
            hmac_base64(&self.key, string_to_sign.as_bytes())
        )
    }
}

impl std::fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Headers that take part in a Blob Storage PUT signature.
#[derive(Debug, Clone, Default)]
pub struct BlobRequestParts<'a> {
    pub content_length: usize,
    pub content_type: &'a str,
    pub if_none_match: Option<&'a str>,
    /// `x-ms-*` headers; any order, names are lowercased when signing.
    pub ms_headers: Vec<(&'a str, String)>,
    /// Path portion of the URL, starting with `/`.
    pub path: &'a str,
}

/// Canonical string-to-sign for a Shared Key PUT request (version 2015-02-21+).
pub fn blob_put_string_to_sign(account: &str, parts: &BlobRequestParts<'_>) -> String {
    let content_length = if parts.content_length == 0 {
        String::new()
    } else {
        parts.content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = parts
        .ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::with_capacity(256);
    for line in [
        "PUT",
        "",
        "",
        content_length.as_str(),
        "",
        parts.content_type,
        "",
        "",
        "",
        parts.if_none_match.unwrap_or(""),
        "",
        "",
    ] {
        out.push_str(line);
        out.push('\n');
    }
    for (name, value) in headers {
        out.push_str(&name);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out.push('/');
    out.push_str(account);
    out.push_str(parts.path);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sas_token_shape() {
        let key = SasKey::new("send", "c2VjcmV0");
        let token = key.token("https://ns.servicebus.windows.net/hub", 1_700_000_000);

        assert!(token.starts_with(
            "SharedAccessSignature sr=https%3A%2F%2Fns.servicebus.windows.net%2Fhub&sig="
        ));
        assert!(token.ends_with("&se=1700000000&skn=send"));
        // signature is url-encoded base64 of a 32-byte digest
        let sig = token.split("&sig=").nth(1).unwrap().split('&').next().unwrap();
        let decoded = urlencoding::decode(sig).unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(decoded.as_bytes())
            .unwrap();
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn sas_token_is_deterministic_per_expiry() {
        let key = SasKey::new("send", "secret");
        let uri = "https://ns.servicebus.windows.net/hub";
        assert_eq!(key.token(uri, 10), key.token(uri, 10));
        assert_ne!(key.token(uri, 10), key.token(uri, 11));
    }

    #[test]
    fn string_to_sign_layout() {
        let parts = BlobRequestParts {
            content_length: 42,
            content_type: "text/plain; charset=utf-8",
            if_none_match: None,
            ms_headers: vec![
                ("x-ms-version", "2021-08-06".to_string()),
                ("x-ms-blob-type", "BlockBlob".to_string()),
                ("x-ms-date", "Fri, 17 May 2024 09:04:33 GMT".to_string()),
            ],
            path: "/logs/modbus_log_20240517_090433.txt",
        };
        let s = blob_put_string_to_sign("acct", &parts);
        let expected = "PUT\n\n\n42\n\ntext/plain; charset=utf-8\n\n\n\n\n\n\n\
x-ms-blob-type:BlockBlob\n\
x-ms-date:Fri, 17 May 2024 09:04:33 GMT\n\
x-ms-version:2021-08-06\n\
/acct/logs/modbus_log_20240517_090433.txt";
        assert_eq!(s, expected);
    }

    #[test]
    fn empty_body_leaves_length_blank() {
        let parts = BlobRequestParts {
            if_none_match: Some("*"),
            path: "/c/b",
            ..Default::default()
        };
        let s = blob_put_string_to_sign("acct", &parts);
        assert!(s.starts_with("PUT\n\n\n\n\n\n\n\n\n*\n\n\n/acct/c/b"));
    }

    #[test]
    fn shared_key_header() {
        let cred = SharedKeyCredential::new("acct", b"key".to_vec());
        let header = cred.authorization("PUT\n");
        assert!(header.starts_with("SharedKey acct:"));
        assert_ne!(header, cred_other().authorization("PUT\n"));
    }

    fn cred_other() -> SharedKeyCredential {
        SharedKeyCredential::new("acct", b"other".to_vec())
    }
}
