//! Prometheus metrics for indexing and search.
//!
//! All metrics live in one process-wide registry under the
//! `misp_global_search` namespace and are exposed on `GET /metrics`.
//!
//! # Example
//! ```no_run
//! use misp_global_search::metrics::SEARCH_REQUESTS_TOTAL;
//!
//! SEARCH_REQUESTS_TOTAL
//!     .with_label_values(&["all", "ok"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "misp_global_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Reindex Metrics
    // ============================================================================

    /// Completed reindex cycles
    ///
    /// Labels: mode (blue_green, direct), outcome (success, failed)
    pub static ref REINDEX_CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("reindex_cycles_total", "Total number of reindex cycles")
            .namespace(NAMESPACE),
        &["mode", "outcome"]
    ).expect("Failed to create REINDEX_CYCLES_TOTAL metric");

    /// Reindex cycle duration in seconds
    ///
    /// Labels: mode
    pub static ref REINDEX_CYCLE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "reindex_cycle_duration_seconds",
            "Reindex cycle duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["mode"]
    ).expect("Failed to create REINDEX_CYCLE_DURATION_SECONDS metric");

    /// Records written to an index
    ///
    /// Labels: collection
    pub static ref REINDEX_DOCUMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("reindex_documents_total", "Total number of records written")
            .namespace(NAMESPACE),
        &["collection"]
    ).expect("Failed to create REINDEX_DOCUMENTS_TOTAL metric");

    /// Source files seen by the normalizer
    ///
    /// Labels: collection, outcome (indexed, skipped, failed)
    pub static ref NORMALIZER_FILES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("normalizer_files_total", "Total number of source files normalized")
            .namespace(NAMESPACE),
        &["collection", "outcome"]
    ).expect("Failed to create NORMALIZER_FILES_TOTAL metric");

    // ============================================================================
    // Search Metrics
    // ============================================================================

    /// Search requests
    ///
    /// Labels: target (single, all), status (ok, empty, error)
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["target", "status"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Search duration in seconds
    ///
    /// Labels: target
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "search_duration_seconds",
            "Search request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["target"]
    ).expect("Failed to create SEARCH_DURATION_SECONDS metric");
}

/// Register every metric with the global registry.
///
/// Calling this more than once is harmless.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(REINDEX_CYCLES_TOTAL.clone()),
        Box::new(REINDEX_CYCLE_DURATION_SECONDS.clone()),
        Box::new(REINDEX_DOCUMENTS_TOTAL.clone()),
        Box::new(NORMALIZER_FILES_TOTAL.clone()),
        Box::new(SEARCH_REQUESTS_TOTAL.clone()),
        Box::new(SEARCH_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Render the registry in the text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_includes_namespace() {
        init_metrics().unwrap();
        SEARCH_REQUESTS_TOTAL.with_label_values(&["all", "ok"]).inc();
        let output = gather_metrics();
        assert!(output.contains("misp_global_search_search_requests_total"));
    }
}
