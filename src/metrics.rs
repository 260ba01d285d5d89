//! Prometheus metrics: HTTP request counters plus domain counters.
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder, so
//! tests and the CLI never touch the global registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
    routing::get,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const HTTP_REQUESTS: &str = "http_requests_total";
const HTTP_DURATION: &str = "http_request_duration_seconds";
const HTTP_IN_FLIGHT: &str = "http_requests_active";

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

static RECORDING: AtomicBool = AtomicBool::new(false);

fn recording() -> bool {
    RECORDING.load(Ordering::Relaxed)
}

/// Installs the Prometheus recorder and spawns its upkeep task.
///
/// Returns `Ok(None)` when `enabled` is false.
pub fn init_metrics(enabled: bool) -> Result<Option<PrometheusHandle>, BuildError> {
    if !enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(HTTP_DURATION.to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    RECORDING.store(true, Ordering::Relaxed);
    Ok(Some(handle))
}

/// Router for the separate metrics listener.
pub fn metrics_app(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    if !recording() {
        return next.run(req).await;
    }

    let started = Instant::now();
    let method = req.method().to_string();
    // Label by route template so ids in the path do not explode cardinality.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());

    gauge!(HTTP_IN_FLIGHT).increment(1.0);
    let response = next.run(req).await;
    gauge!(HTTP_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16().to_string();
    counter!(HTTP_REQUESTS, "method" => method.clone(), "route" => route.clone(), "status" => status)
        .increment(1);
    histogram!(HTTP_DURATION, "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());

    response
}

pub fn track_audit_write_failure(model_name: &str) {
    if recording() {
        counter!("audit_write_failures_total", "model" => model_name.to_string()).increment(1);
    }
}

pub fn track_schedule_conflict(dimension: &str) {
    if recording() {
        counter!("schedule_conflicts_detected_total", "dimension" => dimension.to_string())
            .increment(1);
    }
}

pub fn track_final_grades_computed(count: usize) {
    if recording() {
        counter!("final_grades_computed_total").increment(count as u64);
    }
}

pub fn track_grid_entries_skipped(count: usize) {
    if recording() {
        counter!("grade_grid_entries_skipped_total").increment(count as u64);
    }
}

pub fn track_authorization_check(allowed: bool, permission: &str) {
    if recording() {
        let outcome = if allowed { "allowed" } else { "denied" };
        counter!("authorization_checks_total", "permission" => permission.to_string(), "outcome" => outcome)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        assert!(init_metrics(false).unwrap().is_none());
        assert!(!recording());
        // Counters are safe to call without a recorder.
        track_final_grades_computed(3);
        track_authorization_check(false, "view_grade");
    }
}
