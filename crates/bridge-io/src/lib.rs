pub mod auth;
pub mod connection_string;
pub mod error;
pub mod metrics;
pub mod modbus;
pub mod publisher;
pub mod sim;
pub mod store;

pub use auth::{SasKey, SharedKeyCredential};
pub use connection_string::{EventHubConnection, StorageConnection};
pub use error::{ConnectionStringError, PublishError, TransportError, UploadError};
pub use metrics::{init_metrics, serve_metrics};
pub use modbus::{
    ModbusTcpTransport, ReaderSession, RegisterReader, RegisterSession, RegisterTransport,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MODBUS_PORT, DEFAULT_READ_TIMEOUT,
};
pub use publisher::{EventHubPublisher, EventPublisher, FilePublisher};
pub use sim::SimulatedDevice;
pub use store::{BlobLogStore, DirectoryLogStore, LogStore};
