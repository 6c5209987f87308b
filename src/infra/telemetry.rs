use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

    // Logs go to stderr so command output on stdout stays machine-readable.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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
            "vitrine_fetch_total",
            Unit::Count,
            "Total number of collection API fetches, by outcome."
        );
        describe_histogram!(
            "vitrine_fetch_ms",
            Unit::Milliseconds,
            "Collection API fetch latency in milliseconds."
        );
        describe_counter!(
            "vitrine_normalize_total",
            Unit::Count,
            "Total number of normalized responses, by detected shape."
        );
        describe_counter!(
            "vitrine_cache_write_total",
            Unit::Count,
            "Total number of fetch results written to or fenced out of the cache."
        );
        describe_counter!(
            "vitrine_optimistic_mutation_total",
            Unit::Count,
            "Total number of optimistic mutations applied, by kind."
        );
    });
}
