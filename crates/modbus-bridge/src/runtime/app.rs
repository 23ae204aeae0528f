use crate::cycle::{CycleRunner, PollSettings};
use crate::runtime::config::{ConfigError, EventSink, LogSink, RuntimeConfig};
use crate::runtime::logging::init_tracing;
use crate::runtime::shutdown::spawn_stop_listener;
use crate::runtime::telemetry;
use crate::scheduler::{Scheduler, SchedulerStats};
use bridge_core::{MessageBuilder, SystemClock, TagMap};
use bridge_io::{
    BlobLogStore, DirectoryLogStore, EventHubPublisher, EventPublisher, FilePublisher, LogStore,
    ModbusTcpTransport, PublishError, RegisterReader, RegisterTransport, SimulatedDevice,
    UploadError,
};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Collaborator setup failures after the configuration was accepted.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to set up event publisher: {0}")]
    Publisher(#[from] PublishError),

    #[error("failed to set up log store: {0}")]
    Store(#[from] UploadError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(Some(config)) => config,
        Ok(None) => {
            RuntimeConfig::print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            report_config_error(&e);
            return ExitCode::from(2);
        }
    };

    // Initialize tracing
    init_tracing(config.json_logs);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

fn report_config_error(err: &ConfigError) {
    eprintln!("error: {err}");
    eprintln!("Run with --help for usage.");
}

/// Poll until a stop signal arrives. Returns once the in-flight cycle has
/// finished and its log has been uploaded.
pub async fn run(config: RuntimeConfig) -> Result<SchedulerStats, StartupError> {
    // Initialize metrics
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let runner = build_runner(&config)?;

    info!(
        endpoint = %config.modbus_addr,
        simulated = config.simulate,
        unit_id = config.unit_id,
        start_address = config.start_address,
        count = config.count,
        read_timeout_ms = config.read_timeout.as_millis() as u64,
        interval_s = config.interval.as_secs(),
        location = %config.location_code,
        "Starting Modbus telemetry bridge. Press Enter to stop."
    );

    let cancel = CancellationToken::new();
    spawn_stop_listener(cancel.clone());

    let scheduler = Scheduler::new(config.interval, cancel);
    let runner = &runner;
    let stats = scheduler
        .run(|| async move {
            runner.run_once().await;
        })
        .await;

    info!(
        cycles_run = stats.cycles_run,
        ticks_skipped = stats.ticks_skipped,
        "Run complete"
    );
    Ok(stats)
}

/// Wire the device, sinks and clock described by `config` into a runner.
pub fn build_runner(config: &RuntimeConfig) -> Result<CycleRunner, StartupError> {
    let transport: Arc<dyn RegisterTransport> = if config.simulate {
        info!(start_address = config.start_address, "Using simulated device");
        Arc::new(SimulatedDevice::new(config.start_address))
    } else {
        Arc::new(ModbusTcpTransport)
    };
    let reader = RegisterReader::new(
        transport,
        config.modbus_addr,
        config.unit_id,
        config.connect_timeout,
        config.read_timeout,
    );

    let publisher: Arc<dyn EventPublisher> = match &config.event_sink {
        EventSink::EventHub {
            connection,
            hub_name,
        } => {
            info!(host = %connection.host, hub = %hub_name, "Publishing to event hub");
            Arc::new(EventHubPublisher::new(connection.clone(), hub_name)?)
        }
        EventSink::File(path) => {
            info!(path = %path.display(), "Publishing to file");
            Arc::new(FilePublisher::new(path).map_err(PublishError::from)?)
        }
    };

    let store: Arc<dyn LogStore> = match &config.log_sink {
        LogSink::Blob {
            connection,
            container,
        } => {
            info!(
                account = %connection.credential.account,
                container = %container,
                "Uploading cycle logs to blob storage"
            );
            Arc::new(BlobLogStore::new(connection.clone(), container)?)
        }
        LogSink::Directory(dir) => {
            info!(dir = %dir.display(), "Writing cycle logs to directory");
            Arc::new(DirectoryLogStore::new(dir.clone()))
        }
    };

    let builder = MessageBuilder::new(
        TagMap::reference(),
        config.location_code.clone(),
        config.message_namespace.clone(),
    );

    Ok(CycleRunner::new(
        reader,
        builder,
        publisher,
        store,
        Arc::new(SystemClock::new()),
        PollSettings {
            start_address: config.start_address,
            count: config.count,
        },
    ))
}
