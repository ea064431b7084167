//! Database metrics.
//!
//! Query durations are recorded per query name; pool gauges are refreshed
//! whenever the Prometheus endpoint is scraped.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

pub fn record_query_duration(query_name: &str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name.to_string()
    )
    .record(duration_secs);
}

/// Counts rows removed by cascading deletes, labelled by table.
pub fn record_cascade_rows(table: &'static str, rows: u64) {
    if rows > 0 {
        counter!("database_cascade_deleted_rows_total", "table" => table).increment(rows);
    }
}

/// Publishes connection pool gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one store query.
///
/// ```ignore
/// let timer = QueryTimer::new("find_form_by_id");
/// let result = sqlx::query_as::<_, FormEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}
