use crate::error::TransportError;
use crate::modbus::{RegisterSession, RegisterTransport};
use async_trait::async_trait;
use bridge_core::registers::encode_float_block;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Nominal stream values: flows, temperature, pressure, totals, composition.
const NOMINAL: [f32; 36] = [
    1250.0, 1180.0, 910.0, 46_500.0, 31.5, 48.2, 1.2e6, 1.1e6, 8.6e5, 4.3e7, 2.4e6, 2.2e6,
    1.7e6, 8.6e7, 89.1, 1.2, 0.8, 5.3, 2.1, 0.01, 0.0004, 0.0, 0.0, 0.0, 0.35, 0.42, 0.12,
    0.09, 0.05, 0.02, 0.01, 0.005, 0.002, 0.0, 0.0, 0.03,
];

/// In-process stand-in for the metering device.
///
/// Holding registers from `base_address` hold [`NOMINAL`] as big-endian
/// floats with a slow drift applied on every read.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    base_address: u16,
    reads: Arc<AtomicU64>,
}

impl SimulatedDevice {
    pub fn new(base_address: u16) -> Self {
        Self {
            base_address,
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    fn snapshot(&self) -> Vec<f32> {
        let step = self.reads.fetch_add(1, Ordering::Relaxed) as f32;
        NOMINAL
            .iter()
            .enumerate()
            .map(|(i, nominal)| {
                // +/-1% drift with a per-slot phase so values don't move in lockstep.
                let phase = step * 0.1 + i as f32;
                nominal * (1.0 + 0.01 * phase.sin())
            })
            .collect()
    }

    fn window(&self, address: u16, quantity: u16) -> Result<Vec<u16>, TransportError> {
        let words = encode_float_block(&self.snapshot());
        let offset = address
            .checked_sub(self.base_address)
            .map(usize::from)
            .filter(|off| off + usize::from(quantity) <= words.len())
            .ok_or_else(|| {
                TransportError::Read(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("illegal data address {address} (+{quantity})"),
                ))
            })?;
        Ok(words[offset..offset + usize::from(quantity)].to_vec())
    }
}

#[async_trait]
impl RegisterTransport for SimulatedDevice {
    async fn connect(
        &self,
        _endpoint: SocketAddr,
        _unit_id: u8,
    ) -> Result<Box<dyn RegisterSession>, TransportError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RegisterSession for SimulatedDevice {
    async fn read_holding_registers(
        &mut self,
        address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.window(address, quantity)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
