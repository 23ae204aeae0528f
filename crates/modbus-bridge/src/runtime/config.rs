use bridge_core::measurement::{DEFAULT_LOCATION_CODE, DEFAULT_MESSAGE_NAMESPACE};
use bridge_io::{
    ConnectionStringError, EventHubConnection, StorageConnection, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MODBUS_PORT, DEFAULT_READ_TIMEOUT,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const EVENTHUB_CONNECTION_ENV: &str = "EVENTHUB_CONNECTION_STRING";
pub const BLOB_CONNECTION_ENV: &str = "BLOB_CONNECTION_STRING";

/// Largest float block one read-holding-registers request can carry
/// (125 registers).
pub const MAX_FLOAT_COUNT: u16 = 62;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required option {0}")]
    Missing(&'static str),

    #[error("option {flag} expects a value")]
    MissingValue { flag: String },

    #[error("invalid value {value:?} for {flag}: {reason}")]
    Invalid {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown option {0}")]
    UnknownFlag(String),

    #[error("{sink}: {source}")]
    ConnectionString {
        sink: &'static str,
        #[source]
        source: ConnectionStringError,
    },

    #[error("no {0} configured")]
    NoSink(&'static str),
}

/// Where envelopes go.
#[derive(Debug, Clone)]
pub enum EventSink {
    EventHub {
        connection: EventHubConnection,
        hub_name: String,
    },
    File(PathBuf),
}

/// Where cycle logs go.
#[derive(Debug, Clone)]
pub enum LogSink {
    Blob {
        connection: StorageConnection,
        container: String,
    },
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub interval: Duration,
    pub modbus_addr: SocketAddr,
    pub simulate: bool,
    pub unit_id: u8,
    pub start_address: u16,
    pub count: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub location_code: String,
    pub message_namespace: String,
    pub event_sink: EventSink,
    pub log_sink: LogSink,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
}

/// Raw flag values before validation.
#[derive(Debug, Default)]
struct RawArgs {
    interval_seconds: Option<String>,
    modbus_addr: Option<String>,
    simulate: bool,
    unit_id: Option<String>,
    start_address: Option<String>,
    count: Option<String>,
    connect_timeout_ms: Option<String>,
    read_timeout_ms: Option<String>,
    location_code: Option<String>,
    message_namespace: Option<String>,
    eventhub_connection_string: Option<String>,
    eventhub_name: Option<String>,
    publish_file: Option<PathBuf>,
    blob_connection_string: Option<String>,
    blob_container: Option<String>,
    log_dir: Option<PathBuf>,
    json_logs: bool,
    metrics_addr: Option<String>,
}

impl RuntimeConfig {
    /// Parse the process arguments, falling back to the environment for
    /// connection strings.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args, |key| std::env::var(key).ok())
    }

    /// `args[0]` is the program name. Returns `Ok(None)` when `--help` was
    /// requested.
    pub fn from_args(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let mut raw = RawArgs::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let mut value = || -> Result<String, ConfigError> {
                i += 1;
                args.get(i).cloned().ok_or_else(|| ConfigError::MissingValue {
                    flag: flag.to_string(),
                })
            };
            match flag {
                "--interval-seconds" => raw.interval_seconds = Some(value()?),
                "--modbus-addr" => raw.modbus_addr = Some(value()?),
                "--simulate" => raw.simulate = true,
                "--unit-id" => raw.unit_id = Some(value()?),
                "--start-address" => raw.start_address = Some(value()?),
                "--count" => raw.count = Some(value()?),
                "--connect-timeout-ms" => raw.connect_timeout_ms = Some(value()?),
                "--read-timeout-ms" => raw.read_timeout_ms = Some(value()?),
                "--location-code" => raw.location_code = Some(value()?),
                "--message-namespace" => raw.message_namespace = Some(value()?),
                "--eventhub-connection-string" => {
                    raw.eventhub_connection_string = Some(value()?)
                }
                "--eventhub-name" => raw.eventhub_name = Some(value()?),
                "--publish-file" => raw.publish_file = Some(PathBuf::from(value()?)),
                "--blob-connection-string" => raw.blob_connection_string = Some(value()?),
                "--blob-container" => raw.blob_container = Some(value()?),
                "--log-dir" => raw.log_dir = Some(PathBuf::from(value()?)),
                "--json-logs" => raw.json_logs = true,
                "--metrics-addr" => raw.metrics_addr = Some(value()?),
                "--help" | "-h" => return Ok(None),
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
            i += 1;
        }

        if raw.eventhub_connection_string.is_none() {
            raw.eventhub_connection_string = env(EVENTHUB_CONNECTION_ENV);
        }
        if raw.blob_connection_string.is_none() {
            raw.blob_connection_string = env(BLOB_CONNECTION_ENV);
        }

        Self::validate(raw).map(Some)
    }

    fn validate(raw: RawArgs) -> Result<Self, ConfigError> {
        let interval_seconds: u64 = parse_number(
            "--interval-seconds",
            raw.interval_seconds
                .ok_or(ConfigError::Missing("--interval-seconds"))?,
        )?;
        if interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                flag: "--interval-seconds",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let modbus_addr = match (raw.modbus_addr, raw.simulate) {
            (Some(addr), _) => parse_device_addr(&addr)?,
            (None, true) => SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_MODBUS_PORT),
            (None, false) => return Err(ConfigError::Missing("--modbus-addr")),
        };

        let unit_id = match raw.unit_id {
            Some(v) => parse_number("--unit-id", v)?,
            None => 1,
        };
        let start_address = match raw.start_address {
            Some(v) => parse_number("--start-address", v)?,
            None => 2000,
        };
        let count: u16 = match raw.count {
            Some(v) => parse_number("--count", v)?,
            None => 36,
        };
        if !(1..=MAX_FLOAT_COUNT).contains(&count) {
            return Err(ConfigError::Invalid {
                flag: "--count",
                value: count.to_string(),
                reason: format!("must be between 1 and {MAX_FLOAT_COUNT}"),
            });
        }
        let connect_timeout = match raw.connect_timeout_ms {
            Some(v) => Duration::from_millis(parse_number("--connect-timeout-ms", v)?),
            None => DEFAULT_CONNECT_TIMEOUT,
        };
        let read_timeout = match raw.read_timeout_ms {
            Some(v) => Duration::from_millis(parse_number("--read-timeout-ms", v)?),
            None => DEFAULT_READ_TIMEOUT,
        };
        if read_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                flag: "--read-timeout-ms",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let event_sink = match (raw.eventhub_connection_string, raw.publish_file) {
            (Some(conn), _) => {
                let connection = EventHubConnection::parse(&conn).map_err(|source| {
                    ConfigError::ConnectionString {
                        sink: "event hub connection string",
                        source,
                    }
                })?;
                let hub_name = connection
                    .hub_name(raw.eventhub_name.as_deref())
                    .map_err(|_| ConfigError::Missing("--eventhub-name"))?;
                EventSink::EventHub {
                    connection,
                    hub_name,
                }
            }
            (None, Some(path)) => EventSink::File(path),
            (None, None) => return Err(ConfigError::NoSink("event sink")),
        };

        let log_sink = match (raw.blob_connection_string, raw.log_dir) {
            (Some(conn), _) => {
                let connection = StorageConnection::parse(&conn).map_err(|source| {
                    ConfigError::ConnectionString {
                        sink: "blob connection string",
                        source,
                    }
                })?;
                let container = raw
                    .blob_container
                    .filter(|c| !c.is_empty())
                    .ok_or(ConfigError::Missing("--blob-container"))?;
                LogSink::Blob {
                    connection,
                    container,
                }
            }
            (None, Some(dir)) => LogSink::Directory(dir),
            (None, None) => return Err(ConfigError::NoSink("log sink")),
        };

        Ok(Self {
            interval: Duration::from_secs(interval_seconds),
            modbus_addr,
            simulate: raw.simulate,
            unit_id,
            start_address,
            count,
            connect_timeout,
            read_timeout,
            location_code: raw
                .location_code
                .unwrap_or_else(|| DEFAULT_LOCATION_CODE.to_string()),
            message_namespace: raw
                .message_namespace
                .unwrap_or_else(|| DEFAULT_MESSAGE_NAMESPACE.to_string()),
            event_sink,
            log_sink,
            json_logs: raw.json_logs,
            metrics_addr: raw.metrics_addr,
        })
    }

    pub fn print_help() {
        println!(
            r#"modbus-bridge - Modbus TCP to event stream telemetry bridge

USAGE:
    modbus-bridge --interval-seconds <SECS> --modbus-addr <IP[:PORT]> [OPTIONS]

DEVICE:
    --interval-seconds <SECS>   Polling period in whole seconds (required)
    --modbus-addr <IP[:PORT]>   Device address [default port: 502]
    --simulate                  Poll an in-process simulated device instead
    --unit-id <ID>              Modbus unit id [default: 1]
    --start-address <ADDR>      First holding register [default: 2000]
    --count <N>                 Floats per read, 1-62 [default: 36]
    --connect-timeout-ms <MS>   Connect timeout [default: 1000]
    --read-timeout-ms <MS>      Register read timeout [default: 1000]

MESSAGES:
    --location-code <CODE>      Location stamped on every message [default: DAMMA-ARMST-STRM1]
    --message-namespace <NS>    Envelope type namespace [default: Alto.ConsumersBase.Model]

EVENT SINK (one required):
    --eventhub-connection-string <STR>  Event Hubs connection string
    --eventhub-name <NAME>      Event hub name (or EntityPath in the connection string)
    --publish-file <PATH>       Append envelopes to a JSON-lines file

LOG SINK (one required):
    --blob-connection-string <STR>  Storage account connection string
    --blob-container <NAME>     Container for cycle logs
    --log-dir <PATH>            Write cycle logs to a local directory

OBSERVABILITY:
    --json-logs                 Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>       Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    -h, --help                  Print this help message

ENVIRONMENT VARIABLES:
    EVENTHUB_CONNECTION_STRING  Used when --eventhub-connection-string is absent
    BLOB_CONNECTION_STRING      Used when --blob-connection-string is absent
    RUST_LOG                    Set log filter (e.g., RUST_LOG=debug,modbus_bridge=trace)

Press Enter (or Ctrl-C) to stop after the current cycle.

EXAMPLES:
    # Local dry run against the simulator
    modbus-bridge --interval-seconds 5 --simulate --publish-file events.jsonl --log-dir logs

    # Production
    modbus-bridge --interval-seconds 60 --modbus-addr 10.0.0.15 \
        --eventhub-name telemetry --blob-container modbus-logs \
        --json-logs --metrics-addr 0.0.0.0:9090
"#
        );
    }
}

fn parse_number<T>(flag: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        flag,
        reason: e.to_string(),
        value,
    })
}

/// `IP` or `IP:PORT`. Bare addresses get the standard Modbus port.
fn parse_device_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_MODBUS_PORT))
        .map_err(|e| ConfigError::Invalid {
            flag: "--modbus-addr",
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT_HUB: &str = "Endpoint=sb://ns.servicebus.windows.net/;\
SharedAccessKeyName=send;SharedAccessKey=secret;EntityPath=telemetry";
    const STORAGE: &str = "DefaultEndpointsProtocol=https;AccountName=acct;\
AccountKey=a2V5;EndpointSuffix=core.windows.net";

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("modbus-bridge")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(list: &[&str]) -> Result<RuntimeConfig, ConfigError> {
        RuntimeConfig::from_args(&args(list), no_env).map(|cfg| cfg.expect("not --help"))
    }

    #[test]
    fn local_sinks_with_defaults() {
        let cfg = parse(&[
            "--interval-seconds",
            "5",
            "--modbus-addr",
            "10.0.0.15",
            "--publish-file",
            "out.jsonl",
            "--log-dir",
            "logs",
        ])
        .unwrap();

        assert_eq!(cfg.interval, Duration::from_secs(5));
        assert_eq!(cfg.modbus_addr, "10.0.0.15:502".parse().unwrap());
        assert_eq!(cfg.unit_id, 1);
        assert_eq!(cfg.start_address, 2000);
        assert_eq!(cfg.count, 36);
        assert_eq!(cfg.connect_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.read_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.location_code, "DAMMA-ARMST-STRM1");
        assert_eq!(cfg.message_namespace, "Alto.ConsumersBase.Model");
        assert!(matches!(cfg.event_sink, EventSink::File(ref p) if p == &PathBuf::from("out.jsonl")));
        assert!(matches!(cfg.log_sink, LogSink::Directory(_)));
        assert!(!cfg.simulate);
    }

    #[test]
    fn cloud_sinks_from_environment() {
        let env = |key: &str| match key {
            EVENTHUB_CONNECTION_ENV => Some(EVENT_HUB.to_string()),
            BLOB_CONNECTION_ENV => Some(STORAGE.to_string()),
            _ => None,
        };
        let cfg = RuntimeConfig::from_args(
            &args(&[
                "--interval-seconds",
                "60",
                "--modbus-addr",
                "192.168.1.10:1502",
                "--blob-container",
                "modbus-logs",
            ]),
            env,
        )
        .unwrap()
        .unwrap();

        assert_eq!(cfg.modbus_addr.port(), 1502);
        match cfg.event_sink {
            EventSink::EventHub { hub_name, .. } => assert_eq!(hub_name, "telemetry"),
            other => panic!("unexpected sink {other:?}"),
        }
        match cfg.log_sink {
            LogSink::Blob { container, .. } => assert_eq!(container, "modbus-logs"),
            other => panic!("unexpected sink {other:?}"),
        }
    }

    #[test]
    fn help_short_circuits() {
        assert!(RuntimeConfig::from_args(&args(&["--help"]), no_env)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_interval() {
        let err = parse(&["--modbus-addr", "10.0.0.1", "--publish-file", "a", "--log-dir", "b"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("--interval-seconds")));
    }

    #[test]
    fn zero_or_malformed_interval() {
        for bad in ["0", "ten", "-1"] {
            let err = parse(&[
                "--interval-seconds",
                bad,
                "--simulate",
                "--publish-file",
                "a",
                "--log-dir",
                "b",
            ])
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { flag: "--interval-seconds", .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn malformed_device_address() {
        let err = parse(&[
            "--interval-seconds",
            "5",
            "--modbus-addr",
            "plc.local:502",
            "--publish-file",
            "a",
            "--log-dir",
            "b",
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { flag: "--modbus-addr", .. }));
    }

    #[test]
    fn device_required_unless_simulated() {
        let base = ["--interval-seconds", "5", "--publish-file", "a", "--log-dir", "b"];
        assert!(matches!(
            parse(&base).unwrap_err(),
            ConfigError::Missing("--modbus-addr")
        ));

        let mut simulated = base.to_vec();
        simulated.push("--simulate");
        assert!(parse(&simulated).unwrap().simulate);
    }

    #[test]
    fn missing_sinks() {
        let err = parse(&["--interval-seconds", "5", "--simulate", "--log-dir", "b"]).unwrap_err();
        assert!(matches!(err, ConfigError::NoSink("event sink")));

        let err =
            parse(&["--interval-seconds", "5", "--simulate", "--publish-file", "a"]).unwrap_err();
        assert!(matches!(err, ConfigError::NoSink("log sink")));
    }

    #[test]
    fn blob_sink_needs_container() {
        let err = parse(&[
            "--interval-seconds",
            "5",
            "--simulate",
            "--publish-file",
            "a",
            "--blob-connection-string",
            STORAGE,
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("--blob-container")));
    }

    #[test]
    fn malformed_connection_string() {
        let err = parse(&[
            "--interval-seconds",
            "5",
            "--simulate",
            "--eventhub-connection-string",
            "Endpoint=https://wrong/",
            "--log-dir",
            "b",
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConnectionString { .. }), "{err}");
    }

    #[test]
    fn count_bounds() {
        for bad in ["0", "63"] {
            let err = parse(&[
                "--interval-seconds",
                "5",
                "--simulate",
                "--count",
                bad,
                "--publish-file",
                "a",
                "--log-dir",
                "b",
            ])
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { flag: "--count", .. }));
        }
    }

    #[test]
    fn read_timeout_flag() {
        let base = [
            "--interval-seconds",
            "5",
            "--simulate",
            "--publish-file",
            "a",
            "--log-dir",
            "b",
            "--read-timeout-ms",
        ];

        let mut custom = base.to_vec();
        custom.push("250");
        assert_eq!(parse(&custom).unwrap().read_timeout, Duration::from_millis(250));

        for bad in ["0", "soon"] {
            let mut invalid = base.to_vec();
            invalid.push(bad);
            let err = parse(&invalid).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { flag: "--read-timeout-ms", .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn flag_without_value_and_unknown_flag() {
        assert!(matches!(
            parse(&["--interval-seconds"]).unwrap_err(),
            ConfigError::MissingValue { .. }
        ));
        assert!(matches!(
            parse(&["--bogus"]).unwrap_err(),
            ConfigError::UnknownFlag(_)
        ));
    }
}
