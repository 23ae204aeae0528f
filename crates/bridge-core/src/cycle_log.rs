//! Per-cycle execution log.
//!
//! A cycle owns exactly one [`CycleLog`]. It holds a start line, one line per
//! published register, at most one error line and an end line. Once finished
//! it becomes an immutable [`FinishedLog`] ready for upload.

use crate::measurement::format_value;
use chrono::{DateTime, Local, Utc};

pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const OBJECT_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Upload name for the log of a cycle started at `started_at`.
pub fn object_name(started_at: DateTime<Utc>) -> String {
    format!("modbus_log_{}.txt", started_at.format(OBJECT_TIME_FORMAT))
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(LOG_TIME_FORMAT).to_string()
}

#[derive(Debug)]
pub struct CycleLog {
    started_at: DateTime<Utc>,
    buf: String,
    error_written: bool,
}

impl CycleLog {
    pub fn start(started_at: DateTime<Utc>) -> Self {
        let mut buf = String::with_capacity(2048);
        buf.push_str(&format!("Log Start Time: {}\n", local_time(started_at)));
        Self {
            started_at,
            buf,
            error_written: false,
        }
    }

    pub fn object_name(&self) -> String {
        object_name(self.started_at)
    }

    pub fn record_reading(&mut self, address: u32, value: f32) {
        self.buf
            .push_str(&format!("{address}: {}\n", format_value(value)));
    }

    /// Append the error line. Only the first error of a cycle is kept.
    pub fn record_error(&mut self, message: &str) -> bool {
        if self.error_written {
            return false;
        }
        self.buf.push_str(&format!("Error occurred: {message}\n"));
        self.error_written = true;
        true
    }

    pub fn finish(mut self, ended_at: DateTime<Utc>) -> FinishedLog {
        self.buf
            .push_str(&format!("Log End Time: {}\n", local_time(ended_at)));
        FinishedLog {
            object_name: object_name(self.started_at),
            bytes: self.buf.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedLog {
    pub object_name: String,
    pub bytes: Vec<u8>,
}

impl FinishedLog {
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 4, 33).unwrap()
    }

    #[test]
    fn object_name_uses_utc_seconds() {
        assert_eq!(object_name(start()), "modbus_log_20240517_090433.txt");
    }

    #[test]
    fn successful_cycle_layout() {
        let mut log = CycleLog::start(start());
        log.record_reading(42001, 12.5);
        log.record_reading(42003, 7.0);
        let done = log.finish(start() + chrono::Duration::seconds(1));

        let text = done.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Log Start Time: "));
        assert_eq!(lines[1], "42001: 12.5");
        assert_eq!(lines[2], "42003: 7");
        assert!(lines[3].starts_with("Log End Time: "));
        assert_eq!(done.object_name, "modbus_log_20240517_090433.txt");
    }

    #[test]
    fn only_first_error_is_kept() {
        let mut log = CycleLog::start(start());
        assert!(log.record_error("connection refused"));
        assert!(!log.record_error("second"));
        let text = log.finish(start()).text().into_owned();
        assert_eq!(text.matches("Error occurred:").count(), 1);
        assert!(text.contains("Error occurred: connection refused\n"));
    }
}
