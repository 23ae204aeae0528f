//! Parsers for Azure-style `Key=Value;Key=Value` connection strings.

use crate::auth::{SasKey, SharedKeyCredential};
use crate::error::ConnectionStringError;
use base64::Engine;
use std::collections::HashMap;

/// Split a connection string into case-insensitive key/value pairs. Values may
/// themselves contain `=` (base64 padding).
fn parse_pairs(raw: &str) -> Result<HashMap<String, String>, ConnectionStringError> {
    let mut pairs = HashMap::new();
    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
        pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(pairs)
}

fn required(
    pairs: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, ConnectionStringError> {
    pairs
        .get(&key.to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or(ConnectionStringError::MissingKey(key))
}

/// `Endpoint=sb://<namespace>/;SharedAccessKeyName=..;SharedAccessKey=..[;EntityPath=..]`
#[derive(Debug, Clone)]
pub struct EventHubConnection {
    /// Namespace host, e.g. `contoso.servicebus.windows.net`.
    pub host: String,
    pub key: SasKey,
    pub entity_path: Option<String>,
}

impl EventHubConnection {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let pairs = parse_pairs(raw)?;
        let endpoint = required(&pairs, "Endpoint")?;
        let host = endpoint
            .strip_prefix("sb://")
            .ok_or_else(|| ConnectionStringError::InvalidValue {
                key: "Endpoint",
                reason: "expected sb:// scheme".to_string(),
            })?
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(ConnectionStringError::InvalidValue {
                key: "Endpoint",
                reason: "empty host".to_string(),
            });
        }

        let key_name = required(&pairs, "SharedAccessKeyName")?;
        let key = required(&pairs, "SharedAccessKey")?;
        let entity_path = pairs.get("entitypath").filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            host,
            key: SasKey::new(key_name, key),
            entity_path,
        })
    }

    /// Hub name from the explicit setting, falling back to `EntityPath`.
    pub fn hub_name(&self, explicit: Option<&str>) -> Result<String, ConnectionStringError> {
        explicit
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| self.entity_path.clone())
            .ok_or(ConnectionStringError::MissingKey("EntityPath"))
    }
}

/// `DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..;EndpointSuffix=..`
/// with an optional explicit `BlobEndpoint`.
#[derive(Debug, Clone)]
pub struct StorageConnection {
    pub credential: SharedKeyCredential,
    /// Base URL of the blob service without a trailing slash.
    pub blob_endpoint: String,
}

impl StorageConnection {
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let pairs = parse_pairs(raw)?;
        let account = required(&pairs, "AccountName")?;
        let encoded_key = required(&pairs, "AccountKey")?;
        let key = base64::engine::general_purpose::STANDARD
            .decode(encoded_key.as_bytes())
            .map_err(|e| ConnectionStringError::InvalidValue {
                key: "AccountKey",
                reason: e.to_string(),
            })?;

        let blob_endpoint = match pairs.get("blobendpoint").filter(|v| !v.is_empty()) {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => {
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = pairs
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        Ok(Self {
            credential: SharedKeyCredential::new(account, key),
            blob_endpoint,
        })
    }
}
