#![allow(async_fn_in_trait)]

use std::{sync::OnceLock, time::Instant};

use deadpool_postgres::GenericClient;
use tokio_postgres::{Row, ToStatement, types::ToSql};
use tracing::warn;

fn slow_query_threshold_ms() -> Option<u128> {
    static THRESHOLD: OnceLock<Option<u128>> = OnceLock::new();

    *THRESHOLD.get_or_init(|| {
        std::env::var("TM_DB_LOG_MIN_DURATION_MS")
            .ok()
            .and_then(|raw| raw.parse::<u128>().ok())
            .filter(|ms| *ms > 0)
    })
}

fn warn_if_slow(label: &str, started_at: Instant) {
    let Some(threshold_ms) = slow_query_threshold_ms() else {
        return;
    };
    let elapsed_ms = started_at.elapsed().as_millis();
    if elapsed_ms >= threshold_ms {
        warn!(query = label, elapsed_ms = elapsed_ms as u64, "slow_query_detected");
    }
}

/// Query helpers that warn when a statement exceeds `TM_DB_LOG_MIN_DURATION_MS`.
pub trait TimedClientExt: GenericClient {
    async fn timed_query<S>(
        &self,
        statement: &S,
        params: &[&(dyn ToSql + Sync)],
        label: &str,
    ) -> Result<Vec<Row>, tokio_postgres::Error>
    where
        S: ToStatement + Sync + Send + ?Sized,
    {
        let started = Instant::now();
        let result = self.query(statement, params).await;
        warn_if_slow(label, started);
        result
    }

    async fn timed_query_cached(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
        label: &str,
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        let started = Instant::now();
        let prepared = self.prepare_cached(statement).await?;
        let result = self.query(&prepared, params).await;
        warn_if_slow(label, started);
        result
    }
}

impl<T: GenericClient + ?Sized> TimedClientExt for T {}
