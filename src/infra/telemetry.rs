use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the crate emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "quire_cache_hit_total",
            Unit::Count,
            "Total number of cache reads that returned a live entry."
        );
        describe_counter!(
            "quire_cache_miss_total",
            Unit::Count,
            "Total number of cache reads that found nothing usable."
        );
        describe_counter!(
            "quire_cache_expired_total",
            Unit::Count,
            "Total number of entries dropped because their lifetime passed."
        );
        describe_counter!(
            "quire_cache_evict_total",
            Unit::Count,
            "Total number of entries evicted due to capacity."
        );
        describe_counter!(
            "quire_cache_invalidated_total",
            Unit::Count,
            "Total number of entries removed by invalidation."
        );
        describe_gauge!(
            "quire_cache_entries",
            Unit::Count,
            "Current number of entries held by the cache."
        );
        describe_counter!(
            "quire_batch_fallback_total",
            Unit::Count,
            "Total number of batch lookups answered with a placeholder."
        );
        describe_histogram!(
            "quire_batch_resolve_ms",
            Unit::Milliseconds,
            "Latency of the concurrent fetch phase of a batch lookup."
        );
    });
}
