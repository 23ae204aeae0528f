mod app;
mod config;
mod logging;
mod shutdown;
mod telemetry;

pub use app::{build_runner, run, run_from_args, StartupError};
pub use config::{ConfigError, EventSink, LogSink, RuntimeConfig};
pub use shutdown::spawn_stop_listener;
