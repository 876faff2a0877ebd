//! Prometheus metrics.
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`install_recorder`] has run (tests never install one).

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing::warn;

/// Install the global Prometheus recorder; `None` if one is already set.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!("sigil_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}

pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("sigil_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// `kind` is `manifest` or `poster`; `hit` distinguishes hit/miss.
pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("sigil_cache_lookups_total", "kind" => kind, "result" => result).increment(1);
}

pub fn record_signed_url() {
    counter!("sigil_signed_urls_total").increment(1);
}

pub fn record_flushed_keys(count: usize) {
    counter!("sigil_flushed_keys_total").increment(count as u64);
}
