use std::{env, sync::OnceLock, time::Duration};

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

static EXPORTER_PORT: OnceLock<u16> = OnceLock::new();

pub const MATCH_RUNS_TOTAL: &str = "tm_match_runs_total";
pub const MATCH_DURATION_SECONDS: &str = "tm_match_duration_seconds";
pub const MATCH_RESULTS: &str = "tm_match_results";
pub const CURATED_INVALID_TOTAL: &str = "tm_curated_invalid_total";

/// How a match request ended, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Ok,
    /// Ran, but with at least one degradation notice.
    Degraded,
    InvalidBrief,
    ReferenceError,
}

impl MatchOutcome {
    pub fn as_label(self) -> &'static str {
        match self {
            MatchOutcome::Ok => "ok",
            MatchOutcome::Degraded => "degraded",
            MatchOutcome::InvalidBrief => "invalid_brief",
            MatchOutcome::ReferenceError => "reference_error",
        }
    }
}

fn describe_match_metrics() {
    describe_counter!(MATCH_RUNS_TOTAL, "Match requests by outcome");
    describe_histogram!(
        MATCH_DURATION_SECONDS,
        Unit::Seconds,
        "Wall time from brief resolution to ranked list"
    );
    describe_histogram!(MATCH_RESULTS, Unit::Count, "Length of the returned ranked list");
    describe_counter!(
        CURATED_INVALID_TOTAL,
        "Curated picks skipped because the candidate no longer exists"
    );
}

/// Start a Prometheus exporter on `0.0.0.0:<port>`.
///
/// The port comes from `port_env`, falling back to `default_port`. Must be called
/// from inside a tokio runtime. Later calls return the port of the first exporter.
pub fn init_metrics(port_env: &str, default_port: u16) -> Option<u16> {
    if let Some(port) = EXPORTER_PORT.get() {
        return Some(*port);
    }

    let port = env::var(port_env)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(default_port);

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
    {
        Ok(()) => {
            describe_match_metrics();
            let _ = EXPORTER_PORT.set(port);
            info!(metrics_port = port, "started prometheus exporter");
            Some(port)
        }
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to start prometheus exporter");
            None
        }
    }
}

/// Record one match request. Without an installed exporter this is a no-op.
pub fn record_match_run(
    outcome: MatchOutcome,
    elapsed: Duration,
    result_count: usize,
    curated_invalid: usize,
) {
    counter!(MATCH_RUNS_TOTAL, "outcome" => outcome.as_label()).increment(1);
    histogram!(MATCH_DURATION_SECONDS).record(elapsed.as_secs_f64());

    if matches!(outcome, MatchOutcome::Ok | MatchOutcome::Degraded) {
        histogram!(MATCH_RESULTS).record(result_count as f64);
    }
    if curated_invalid > 0 {
        counter!(CURATED_INVALID_TOTAL).increment(curated_invalid as u64);
    }
}
