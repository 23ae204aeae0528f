use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the field device.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {endpoint} timed out after {}ms", .after.as_millis())]
    ConnectTimeout { endpoint: SocketAddr, after: Duration },

    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("register read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("register read timed out after {}ms", .after.as_millis())]
    ReadTimeout { after: Duration },

    #[error("malformed register block: {0}")]
    Decode(#[from] bridge_core::DecodeError),

    #[error("disconnect failed: {0}")]
    Disconnect(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event hub rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("event hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),

    #[error("publisher unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("blob {name} already exists")]
    AlreadyExists { name: String },

    #[error("blob storage rejected upload with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("blob request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to write log file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionStringError {
    #[error("malformed segment {0:?} (expected Key=Value)")]
    MalformedSegment(String),

    #[error("missing required key {0}")]
    MissingKey(&'static str),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
