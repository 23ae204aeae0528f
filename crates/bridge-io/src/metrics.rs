//! Prometheus metrics for the telemetry bridge.
//!
//! Cycle outcomes, publish volume and scheduler pressure. Served over HTTP on
//! `/metrics` with `/health` and `/ready` endpoints.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Cycle Metrics
// ============================================================================

/// Polling cycles run to completion (successful or not)
pub static CYCLES_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "modbus_bridge_cycles_executed_total",
        "Polling cycles run to completion",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Cycles that ended with an error, by stage
pub static CYCLES_FAILED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "modbus_bridge_cycles_failed_total",
            "Polling cycles that ended with an error",
        ),
        &["kind"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Wall time of a full cycle including upload
pub static CYCLE_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "modbus_bridge_cycle_duration_seconds",
            "Wall time of a polling cycle including log upload",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Unix time of the last cycle that published without error
pub static LAST_SUCCESS_UNIX: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "modbus_bridge_last_success_unixtime",
        "Unix time of the last cycle that completed without error",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Publish / Upload Metrics
// ============================================================================

/// Envelopes accepted by the event publisher
pub static MESSAGES_PUBLISHED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "modbus_bridge_messages_published_total",
        "Envelopes accepted by the event publisher",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Cycle logs that could not be uploaded
pub static LOG_UPLOAD_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "modbus_bridge_log_upload_failures_total",
        "Cycle logs that could not be uploaded",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Ticks dropped because a cycle was already running and one was queued
pub static TICKS_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "modbus_bridge_ticks_skipped_total",
        "Scheduler ticks dropped while a cycle was in flight",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            let response = match request.url() {
                "/metrics" => match render() {
                    Ok(buffer) => {
                        let mut response = Response::from_data(buffer);
                        if let Ok(header) = tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        ) {
                            response = response.with_header(header);
                        }
                        response
                    }
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        Response::from_string("Internal Server Error").with_status_code(500)
                    }
                },
                "/health" => Response::from_string("OK"),
                "/ready" => {
                    // Ready once the first cycle has run
                    if CYCLES_EXECUTED.get() > 0 {
                        Response::from_string("Ready")
                    } else {
                        Response::from_string("Not Ready").with_status_code(503)
                    }
                }
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    })
}

/// Encode the registry in the Prometheus text format.
pub fn render() -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = CYCLES_EXECUTED.get();
    let _ = CYCLES_FAILED.with_label_values(&["connection"]).get();
    let _ = CYCLE_DURATION_SECONDS.get_sample_count();
    let _ = LAST_SUCCESS_UNIX.get();
    let _ = MESSAGES_PUBLISHED.get();
    let _ = LOG_UPLOAD_FAILURES.get();
    let _ = TICKS_SKIPPED.get();
}
