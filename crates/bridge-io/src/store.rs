//! Durable storage for per-cycle execution logs.

use crate::auth::{blob_put_string_to_sign, BlobRequestParts, SharedKeyCredential};
use crate::connection_string::StorageConnection;
use crate::error::UploadError;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Store `bytes` under `name`. With `overwrite == false` an existing
    /// object is left untouched and [`UploadError::AlreadyExists`] is returned.
    async fn upload(&self, name: &str, bytes: Vec<u8>, overwrite: bool)
        -> Result<(), UploadError>;
}

const STORAGE_API_VERSION: &str = "2021-08-06";
const LOG_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Uploads logs as block blobs into one container.
pub struct BlobLogStore {
    client: reqwest::Client,
    credential: SharedKeyCredential,
    container_url: String,
    /// Path portion of `container_url`, used in the canonicalized resource.
    container_path: String,
}

impl BlobLogStore {
    pub fn new(connection: StorageConnection, container: &str) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let container_url = format!(
            "{}/{}",
            connection.blob_endpoint,
            urlencoding::encode(container)
        );
        let container_path = url_path(&container_url).to_string();
        Ok(Self {
            client,
            credential: connection.credential,
            container_url,
            container_path,
        })
    }

    pub fn blob_url(&self, name: &str) -> String {
        format!("{}/{}", self.container_url, urlencoding::encode(name))
    }
}

/// Path component of an absolute URL (everything from the first `/` after the
/// authority).
fn url_path(url: &str) -> &str {
    let after_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    after_scheme
        .find('/')
        .map(|idx| &after_scheme[idx..])
        .unwrap_or("/")
}

#[async_trait]
impl LogStore for BlobLogStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let path = format!("{}/{}", self.container_path, urlencoding::encode(name));
        let if_none_match = (!overwrite).then_some("*");

        let parts = BlobRequestParts {
            content_length: bytes.len(),
            content_type: LOG_CONTENT_TYPE,
            if_none_match,
            ms_headers: vec![
                ("x-ms-blob-type", "BlockBlob".to_string()),
                ("x-ms-date", date.clone()),
                ("x-ms-version", STORAGE_API_VERSION.to_string()),
            ],
            path: &path,
        };
        let authorization = self
            .credential
            .authorization(&blob_put_string_to_sign(&self.credential.account, &parts));

        let mut request = self
            .client
            .put(self.blob_url(name))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, LOG_CONTENT_TYPE)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-date", date)
            .header("x-ms-version", STORAGE_API_VERSION);
        if let Some(tag) = if_none_match {
            request = request.header(reqwest::header::IF_NONE_MATCH, tag);
        }

        let response = request.body(bytes).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT && !overwrite {
            return Err(UploadError::AlreadyExists {
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(blob = name, status = status.as_u16(), "Log uploaded to blob storage");
        Ok(())
    }
}

/// Writes logs as files under one directory.
#[derive(Debug, Clone)]
pub struct DirectoryLogStore {
    dir: PathBuf,
}

impl DirectoryLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl LogStore for DirectoryLogStore {
    async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(UploadError::AlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes).await?;
        file.flush().await?;
        debug!(path = %path.display(), "Log written to directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn url_path_extraction() {
        assert_eq!(url_path("https://a.blob.core.windows.net/logs"), "/logs");
        assert_eq!(
            url_path("http://127.0.0.1:10000/devstoreaccount1/logs"),
            "/devstoreaccount1/logs"
        );
        assert_eq!(url_path("https://host"), "/");
    }

    #[test]
    fn blob_urls_are_container_scoped() {
        let conn = StorageConnection::parse("AccountName=acct;AccountKey=a2V5").unwrap();
        let store = BlobLogStore::new(conn, "modbus-logs").unwrap();
        assert_eq!(
            store.blob_url("modbus_log_20240517_090433.txt"),
            "https://acct.blob.core.windows.net/modbus-logs/modbus_log_20240517_090433.txt"
        );
        assert_eq!(store.container_path, "/modbus-logs");
    }

    #[tokio::test]
    async fn directory_store_overwrite_semantics() {
        let dir = tempdir().unwrap();
        let store = DirectoryLogStore::new(dir.path().join("logs"));

        store.upload("a.txt", b"first".to_vec(), true).await.unwrap();
        store.upload("a.txt", b"second".to_vec(), true).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("logs/a.txt")).unwrap(),
            "second"
        );

        let err = store
            .upload("a.txt", b"third".to_vec(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::AlreadyExists { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("logs/a.txt")).unwrap(),
            "second"
        );
    }
}
