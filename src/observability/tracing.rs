use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to initialize OpenTelemetry: {0}")]
    OpenTelemetryInit(#[from] opentelemetry::trace::TraceError),
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Settings consumed by [`init_observability`]
#[derive(Debug, Clone)]
pub struct TelemetrySettings<'a> {
    pub service_name: &'a str,
    pub service_version: &'a str,
    /// OTLP gRPC endpoint; empty disables trace export
    pub otlp_endpoint: &'a str,
    pub log_level: &'a str,
    pub enable_json_logging: bool,
}

/// Initialize structured logging and, when an endpoint is configured,
/// OpenTelemetry trace export.
///
/// `RUST_LOG` wins over the configured log level when set.
pub fn init_observability(settings: &TelemetrySettings<'_>) -> Result<(), ObservabilityError> {
    let opentelemetry_layer = if settings.otlp_endpoint.is_empty() {
        None
    } else {
        let tracer = init_opentelemetry_tracer(
            settings.service_name,
            settings.service_version,
            settings.otlp_endpoint,
        )?;
        Some(OpenTelemetryLayer::new(tracer))
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},tower_http={level},aws_sdk_dynamodb=warn,aws_config=warn,aws_smithy_runtime=warn",
            env!("CARGO_CRATE_NAME"),
            level = settings.log_level,
        )
        .into()
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(opentelemetry_layer);

    let result = if settings.enable_json_logging {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_target(false)
                    .with_level(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()
    };
    result.map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;

    info!(
        service = settings.service_name,
        version = settings.service_version,
        tracing_export = !settings.otlp_endpoint.is_empty(),
        "Observability initialized"
    );
    Ok(())
}

/// Trace id of the active OpenTelemetry span, if it carries a valid one.
pub fn get_current_trace_id() -> Option<String> {
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let context = tracing::Span::current().context();
    let span_context = context.span().span_context().clone();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_with_trace {
    ($level:ident, $($arg:tt)*) => {
        match $crate::observability::tracing::get_current_trace_id() {
            Some(trace_id) => tracing::$level!(trace_id = %trace_id, $($arg)*),
            None => tracing::$level!($($arg)*),
        }
    };
}

/// `tracing::info!` with the current trace id attached when there is one.
#[macro_export]
macro_rules! info_with_trace {
    ($($arg:tt)*) => { $crate::__log_with_trace!(info, $($arg)*) };
}

#[macro_export]
macro_rules! warn_with_trace {
    ($($arg:tt)*) => { $crate::__log_with_trace!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! error_with_trace {
    ($($arg:tt)*) => { $crate::__log_with_trace!(error, $($arg)*) };
}

fn init_opentelemetry_tracer(
    service_name: &str,
    service_version: &str,
    otlp_endpoint: &str,
) -> Result<opentelemetry_sdk::trace::Tracer, ObservabilityError> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
        KeyValue::new("service.namespace", "qmenu"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(otlp_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_max_events_per_span(64)
                .with_max_attributes_per_span(32)
                .with_resource(resource),
        )
        .with_batch_config(
            trace::BatchConfig::default()
                .with_max_queue_size(2048)
                .with_max_export_batch_size(512)
                .with_max_export_timeout(Duration::from_secs(30))
                .with_scheduled_delay(Duration::from_millis(500)),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

/// Flush and shut down the tracer provider, giving up after five seconds
pub async fn shutdown_observability() {
    info!("Shutting down observability");

    // Shutdown blocks while pending spans are exported
    let shutdown_task = tokio::task::spawn_blocking(|| {
        global::shutdown_tracer_provider();
    });

    match tokio::time::timeout(Duration::from_secs(5), shutdown_task).await {
        Ok(Ok(())) => info!("Observability shutdown completed successfully"),
        Ok(Err(e)) => warn!("Error during observability shutdown: {}", e),
        Err(_) => warn!("Observability shutdown timed out after 5 seconds"),
    }
}
