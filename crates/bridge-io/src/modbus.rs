//! Device access over Modbus TCP.
//!
//! [`RegisterTransport`] and [`RegisterSession`] are the seam between the
//! cycle and the wire. [`ModbusTcpTransport`] is the production
//! implementation. [`RegisterReader`] adds the bounded connect, the bounded
//! read and float decoding on top of any transport.

use crate::error::TransportError;
use async_trait::async_trait;
use bridge_core::registers::{decode_float_block, WORDS_PER_FLOAT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_modbus::prelude::*;
use tracing::{debug, info};

pub const DEFAULT_MODBUS_PORT: u16 = 502;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Opens sessions to a device.
#[async_trait]
pub trait RegisterTransport: Send + Sync {
    async fn connect(
        &self,
        endpoint: SocketAddr,
        unit_id: u8,
    ) -> Result<Box<dyn RegisterSession>, TransportError>;
}

/// One open connection to a device.
#[async_trait]
pub trait RegisterSession: Send {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModbusTcpTransport;

#[async_trait]
impl RegisterTransport for ModbusTcpTransport {
    async fn connect(
        &self,
        endpoint: SocketAddr,
        unit_id: u8,
    ) -> Result<Box<dyn RegisterSession>, TransportError> {
        let ctx = tcp::connect_slave(endpoint, Slave(unit_id))
            .await
            .map_err(|source| TransportError::Connect { endpoint, source })?;
        info!(%endpoint, unit_id, "Connected to Modbus TCP device");
        Ok(Box::new(ModbusTcpSession { ctx, endpoint }))
    }
}

struct ModbusTcpSession {
    ctx: tokio_modbus::client::Context,
    endpoint: SocketAddr,
}

#[async_trait]
impl RegisterSession for ModbusTcpSession {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let words = self
            .ctx
            .read_holding_registers(address, quantity)
            .await
            .map_err(TransportError::Read)?;
        debug!(
            endpoint = %self.endpoint,
            address,
            quantity,
            received = words.len(),
            "Read holding registers"
        );
        Ok(words)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.ctx
            .disconnect()
            .await
            .map_err(TransportError::Disconnect)?;
        debug!(endpoint = %self.endpoint, "Disconnected from Modbus TCP device");
        Ok(())
    }
}

/// Bounded-connect, bounded-read access to one device.
#[derive(Clone)]
pub struct RegisterReader {
    transport: Arc<dyn RegisterTransport>,
    endpoint: SocketAddr,
    unit_id: u8,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl RegisterReader {
    pub fn new(
        transport: Arc<dyn RegisterTransport>,
        endpoint: SocketAddr,
        unit_id: u8,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoint,
            unit_id,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Connect, failing with [`TransportError::ConnectTimeout`] once the
    /// configured timeout elapses.
    pub async fn connect(&self) -> Result<ReaderSession, TransportError> {
        let session = tokio::time::timeout(
            self.connect_timeout,
            self.transport.connect(self.endpoint, self.unit_id),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            endpoint: self.endpoint,
            after: self.connect_timeout,
        })??;

        Ok(ReaderSession {
            inner: session,
            read_timeout: self.read_timeout,
        })
    }
}

/// An open device connection. The caller must call [`ReaderSession::disconnect`]
/// on every path; dropping the session closes the socket without the
/// protocol-level goodbye.
pub struct ReaderSession {
    inner: Box<dyn RegisterSession>,
    read_timeout: Duration,
}

impl ReaderSession {
    /// One read of `count` consecutive 32-bit floats starting at `start_address`.
    /// A device that accepts the request but never answers fails with
    /// [`TransportError::ReadTimeout`].
    pub async fn read_floats(
        &mut self,
        start_address: u16,
        count: u16,
    ) -> Result<Vec<f32>, TransportError> {
        let quantity = count.saturating_mul(WORDS_PER_FLOAT);
        let words = tokio::time::timeout(
            self.read_timeout,
            self.inner.read_holding_registers(start_address, quantity),
        )
        .await
        .map_err(|_| TransportError::ReadTimeout {
            after: self.read_timeout,
        })??;
        Ok(decode_float_block(&words, count)?)
    }

    pub async fn disconnect(mut self) -> Result<(), TransportError> {
        self.inner.disconnect().await
    }
}
