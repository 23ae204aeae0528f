//! Event stream publishers.
//!
//! Each call publishes one serialized envelope. Delivery is at-least-once from
//! the caller's point of view: a failed call may still have been accepted.

use crate::auth::SasKey;
use crate::connection_string::EventHubConnection;
use crate::error::PublishError;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError>;
}

const EVENT_CONTENT_TYPE: &str = "application/atom+xml;type=entry;charset=utf-8";
const SAS_TOKEN_TTL: Duration = Duration::from_secs(3600);
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends events through the Event Hubs HTTPS endpoint.
pub struct EventHubPublisher {
    client: reqwest::Client,
    resource_uri: String,
    messages_url: String,
    key: SasKey,
}

impl EventHubPublisher {
    pub fn new(connection: EventHubConnection, hub_name: &str) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let resource_uri = format!("https://{}/{}", connection.host, hub_name);
        Ok(Self {
            client,
            messages_url: format!("{resource_uri}/messages"),
            resource_uri,
            key: connection.key,
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    fn authorization(&self) -> String {
        let expiry = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(SAS_TOKEN_TTL)
            .as_secs();
        self.key.token(&self.resource_uri, expiry)
    }
}

#[async_trait]
impl EventPublisher for EventHubPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        let bytes = payload.len();
        let response = self
            .client
            .post(&self.messages_url)
            .header(reqwest::header::AUTHORIZATION, self.authorization())
            .header(reqwest::header::CONTENT_TYPE, EVENT_CONTENT_TYPE)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(bytes, status = status.as_u16(), "Event accepted by event hub");
        Ok(())
    }
}

/// Appends each event as one line of a JSON-lines file.
pub struct FilePublisher {
    writer: Mutex<BufWriter<File>>,
}

impl FilePublisher {
    /// Opens `path` in append mode, creating parent directories as needed.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::with_capacity(8192, file)),
        })
    }
}

#[async_trait]
impl EventPublisher for FilePublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| PublishError::Unavailable("event file writer poisoned".into()))?;
        writer.write_all(&payload)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
