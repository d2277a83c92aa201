use crate::config::ObservabilityConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "misp_global_search=info,tower_http=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `observability.log_level`; with neither set the crate
/// and the HTTP layer log at `info`.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if config.log_level.is_empty() {
                EnvFilter::try_new(DEFAULT_FILTER)
            } else {
                EnvFilter::try_new(format!(
                    "misp_global_search={level},mgs_indexer={level},tower_http={level}",
                    level = config.log_level
                ))
            }
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing already initialized: {}", e);
    }
}
