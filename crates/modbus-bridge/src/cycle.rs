//! One polling cycle: read the device, publish every mapped value, upload the
//! cycle log.

use bridge_core::registers::readings;
use bridge_core::{Clock, CycleError, CycleLog, MessageBuilder};
use bridge_io::metrics::{
    CYCLES_EXECUTED, CYCLES_FAILED, CYCLE_DURATION_SECONDS, LAST_SUCCESS_UNIX,
    LOG_UPLOAD_FAILURES, MESSAGES_PUBLISHED,
};
use bridge_io::{EventPublisher, LogStore, ReaderSession, RegisterReader};
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    Reading,
    Publishing,
    Disconnecting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connecting => "connecting",
            Stage::Reading => "reading",
            Stage::Publishing => "publishing",
            Stage::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Which block to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub start_address: u16,
    pub count: u16,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            start_address: 2000,
            count: 36,
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub object_name: String,
    /// Envelopes accepted by the publisher before the cycle ended.
    pub published: usize,
    /// First error that ended the cycle early.
    pub error: Option<CycleError>,
    /// Log upload result. Never copied into `error`.
    pub upload: Result<(), CycleError>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct CycleRunner {
    reader: RegisterReader,
    builder: MessageBuilder,
    publisher: Arc<dyn EventPublisher>,
    store: Arc<dyn LogStore>,
    clock: Arc<dyn Clock>,
    poll: PollSettings,
    last_start: Mutex<Option<DateTime<Utc>>>,
}

impl CycleRunner {
    pub fn new(
        reader: RegisterReader,
        builder: MessageBuilder,
        publisher: Arc<dyn EventPublisher>,
        store: Arc<dyn LogStore>,
        clock: Arc<dyn Clock>,
        poll: PollSettings,
    ) -> Self {
        Self {
            reader,
            builder,
            publisher,
            store,
            clock,
            poll,
            last_start: Mutex::new(None),
        }
    }

    /// Run one cycle to completion. Every failure is captured in the report.
    pub async fn run_once(&self) -> CycleReport {
        let timer = CYCLE_DURATION_SECONDS.start_timer();
        let mut log = CycleLog::start(self.claim_start().await);
        let object_name = log.object_name();
        let mut published = 0usize;

        let error = self.poll_device(&mut log, &mut published).await.err();
        if let Some(err) = &error {
            log.record_error(&err.to_string());
        }

        let finished = log.finish(self.clock.now());
        let upload = self
            .store
            .upload(&finished.object_name, finished.bytes, true)
            .await
            .map_err(|e| CycleError::Upload {
                object: object_name.clone(),
                reason: e.to_string(),
            });
        if let Err(e) = &upload {
            LOG_UPLOAD_FAILURES.inc();
            error!(object = %object_name, error = %e, "Cycle log upload failed");
        }

        CYCLES_EXECUTED.inc();
        match &error {
            None => {
                LAST_SUCCESS_UNIX.set(self.clock.now().timestamp() as f64);
                info!(
                    object = %object_name,
                    published,
                    "Modbus data retrieval and event publishing completed successfully"
                );
            }
            Some(err) => {
                CYCLES_FAILED.with_label_values(&[err.kind()]).inc();
                warn!(
                    object = %object_name,
                    kind = err.kind(),
                    published,
                    error = %err,
                    "Cycle ended with error"
                );
            }
        }
        timer.observe_duration();

        CycleReport {
            object_name,
            published,
            error,
            upload,
        }
    }

    /// Start time for a new cycle log. Log names have one-second resolution,
    /// so a cycle that would land in the previous cycle's second waits for the
    /// next one instead of overwriting that log.
    async fn claim_start(&self) -> DateTime<Utc> {
        let previous = *self.last_start.lock().unwrap_or_else(|e| e.into_inner());
        let mut now = self.clock.now();
        if let Some(previous) = previous {
            let next_second = previous.trunc_subsecs(0) + chrono::Duration::seconds(1);
            if now < next_second {
                let wait = (next_second - now).to_std().unwrap_or_default();
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    "Previous cycle log still owns this second, waiting"
                );
                tokio::time::sleep(wait).await;
                now = self.clock.now().max(next_second);
            }
        }
        *self.last_start.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        now
    }

    /// Connect, read and publish. The session is disconnected on every path
    /// once the connect has succeeded.
    async fn poll_device(
        &self,
        log: &mut CycleLog,
        published: &mut usize,
    ) -> Result<(), CycleError> {
        debug!(stage = %Stage::Connecting, endpoint = %self.reader.endpoint());
        let mut session = self
            .reader
            .connect()
            .await
            .map_err(|e| CycleError::Connection {
                endpoint: self.reader.endpoint().to_string(),
                reason: e.to_string(),
            })?;

        let outcome = self.read_and_publish(&mut session, log, published).await;

        debug!(stage = %Stage::Disconnecting);
        if let Err(e) = session.disconnect().await {
            warn!(endpoint = %self.reader.endpoint(), error = %e, "Disconnect failed");
        }
        outcome
    }

    async fn read_and_publish(
        &self,
        session: &mut ReaderSession,
        log: &mut CycleLog,
        published: &mut usize,
    ) -> Result<(), CycleError> {
        let PollSettings {
            start_address,
            count,
        } = self.poll;

        debug!(stage = %Stage::Reading, start_address, count);
        let values = session
            .read_floats(start_address, count)
            .await
            .map_err(|e| CycleError::Read {
                start_address,
                count,
                reason: e.to_string(),
            })?;

        debug!(stage = %Stage::Publishing, values = values.len());
        for reading in readings(start_address, &values) {
            let Some(measurement) =
                self.builder
                    .build(start_address, reading.index, reading.value, self.clock.now())
            else {
                continue;
            };
            let address = reading.address;

            let payload = self
                .builder
                .envelope(measurement)
                .to_bytes()
                .map_err(|e| CycleError::Publish {
                    address,
                    reason: e.to_string(),
                })?;
            self.publisher
                .publish(payload)
                .await
                .map_err(|e| CycleError::Publish {
                    address,
                    reason: e.to_string(),
                })?;

            log.record_reading(address, reading.value);
            *published += 1;
            MESSAGES_PUBLISHED.inc();
            info!(address, value = reading.value, "Published");
        }
        Ok(())
    }
}
