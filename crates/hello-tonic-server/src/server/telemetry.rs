//! # Logging and Tracing
//!
//! Log output always goes through `tracing_subscriber::fmt`:
//!
//! - development mode (`--dev`): pretty, colored output with local RFC 3339
//!   timestamps, thread ids and file/line, default level `debug`.
//! - otherwise: one JSON object per line, default level `info`.
//!
//! `RUST_LOG` overrides the default level in both modes.
//!
//! ## Feature matrix
//!
//! - `otel`: Exports spans through OpenTelemetry.
//! - `stdout`: Enables the stdout span exporter.
//! - `otlp`: Enables the OTLP/gRPC span exporter. The endpoint is read from
//!   `OTEL_EXPORTER_OTLP_ENDPOINT`.
//!
//! Exporters require `otel`. Both may be enabled at the same time.
//!
//! ## Span behavior
//!
//! - Spans (e.g. the per-request spans of the HTTP gateway) are exported to
//!   any enabled backend.
//! - Events inside a span become span events in the backend.
//! - Events outside of a span are only shown in log output.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features otel,otlp -- --dev
//! ```

#[cfg(all(feature = "otlp", not(feature = "otel")))]
compile_error!("The 'otlp' feature requires the 'otel' feature to be enabled.");

#[cfg(all(feature = "stdout", not(feature = "otel")))]
compile_error!("The 'stdout' feature requires the 'otel' feature to be enabled.");

use tracing_subscriber::{
    EnvFilter,
    fmt::{
        self,
        time::{ChronoLocal, ChronoUtc},
    },
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[cfg(feature = "otel")]
use opentelemetry::{InstrumentationScope, KeyValue, trace::TracerProvider};
#[cfg(feature = "otel")]
use opentelemetry_sdk::{Resource, propagation::TraceContextPropagator, trace as sdktrace};
#[cfg(feature = "otel")]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "otel")]
const SERVICE_NAME: &str = "hello-tonic";

/// Handles that must outlive the supervisor so buffered spans are flushed on
/// exit.
pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every exporter. Errors are printed to stderr,
    /// the log pipeline may already be gone at this point.
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or an exporter cannot be
/// built.
pub fn init_telemetry(dev: bool) -> anyhow::Result<TelemetryProviders> {
    let default_level = if dev { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let pretty = dev.then(|| {
        fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });
    let json = (!dev).then(|| {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(false)
    });

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json);

    #[cfg(feature = "otel")]
    let (registry, tracer_provider) = {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let tracer_provider = init_tracer()?;
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());

        let scope = InstrumentationScope::builder(SERVICE_NAME)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        let registry = registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope))
                .with_error_records_to_exceptions(true),
        );
        (registry, tracer_provider)
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
    })
}

#[cfg(feature = "otel")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(all(feature = "otel", any(feature = "stdout", feature = "otlp")))]
fn batch_config() -> sdktrace::BatchConfig {
    sdktrace::BatchConfigBuilder::default()
        .with_scheduled_delay(std::time::Duration::from_secs(5))
        .with_max_queue_size(2048)
        .build()
}

#[cfg(feature = "otel")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config())
            .build();
        builder.with_span_processor(batch)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;
        use opentelemetry_otlp::WithExportConfig;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_timeout(std::time::Duration::from_secs(10))
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .build()
            .context("failed to build OTLP span exporter")?;
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config())
            .build();
        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}
