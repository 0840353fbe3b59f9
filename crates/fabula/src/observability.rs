//! Span export for the binary's `tracing` instrumentation.
//!
//! Sessions, chapter submissions, and model calls are already instrumented
//! with `#[tracing::instrument]`; this module bridges those spans to
//! OpenTelemetry and writes them to stdout next to the regular log lines on
//! stderr.

use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use opentelemetry_stdout::SpanExporter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,fabula=info,fabula_story=info";

/// How to set up logging and span export.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Name spans are attributed to
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit log lines as JSON
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Configuration for the given service name with the default filter.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            filter: DEFAULT_FILTER.to_string(),
            json_logs: false,
        }
    }

    /// Use `filter` when `RUST_LOG` is unset.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Emit log lines as JSON.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

/// Flushes and shuts down span export when dropped.
#[derive(Debug)]
pub struct ObservabilityGuard {
    provider: SdkTracerProvider,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Failed to flush spans: {}", e);
        }
    }
}

/// Install the global subscriber: env filter, fmt layer on stderr, and an
/// OpenTelemetry layer exporting spans to stdout.
///
/// Keep the returned guard alive for the life of the process.
pub fn init_observability(
    config: ObservabilityConfig,
) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([KeyValue::new("service.version", env!("CARGO_PKG_VERSION"))])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .with_resource(resource)
        .build();
    global::set_tracer_provider(provider.clone());

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name));

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let fmt_layer = if config.json_logs {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(ObservabilityGuard { provider })
}
