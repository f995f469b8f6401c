//! Telemetry logic.
//! Support logging and metrics.
use metrics::Unit;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::prelude::*;

pub const CACHE_HITS: &str = "directory_cache_hits_total";
pub const CACHE_MISSES: &str = "directory_cache_misses_total";
pub const CACHE_INVALIDATIONS: &str = "directory_cache_invalidations_total";
pub const ROLE_TRANSITIONS: &str = "directory_role_transitions_total";

/// Install a formatting subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn setup_logging(level: Option<&str>) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Describe directory metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(
        CACHE_HITS,
        Unit::Count,
        "Profile lookups answered by the cache."
    );
    metrics::describe_counter!(
        CACHE_MISSES,
        Unit::Count,
        "Profile lookups that went to storage."
    );
    metrics::describe_counter!(
        CACHE_INVALIDATIONS,
        Unit::Count,
        "Cache entries dropped by writers."
    );
    metrics::describe_counter!(
        ROLE_TRANSITIONS,
        Unit::Count,
        "Guest promotions and user demotions."
    );
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ProfileCache;

    #[test]
    fn test_metrics_recorder_renders_cache_counters() {
        let handle = setup_metrics_recorder().unwrap();

        let cache = ProfileCache::default();
        assert!(cache.profile("missing").is_none());
        cache.invalidate_profile("missing");

        let rendered = handle.render();
        assert!(rendered.contains(CACHE_MISSES));
        assert!(rendered.contains(CACHE_INVALIDATIONS));
    }
}
