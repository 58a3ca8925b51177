use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

fn counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, MetricsError> {
    let metric = CounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn histogram(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<HistogramVec, MetricsError> {
    let opts = HistogramOpts::new(name, help).buckets(LATENCY_BUCKETS.to_vec());
    let metric = HistogramVec::new(opts, labels)?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Prometheus collectors for the qmenu service, each on a private registry so
/// tests can build as many as they like.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: CounterVec,
    request_latency: HistogramVec,
    in_flight: GaugeVec,
    store_calls: CounterVec,
    store_latency: HistogramVec,
    auth_attempts: CounterVec,
    restaurant_operations: CounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        info!("Registering Prometheus collectors");

        let requests = counter(
            &registry,
            "http_requests_total",
            "HTTP requests answered, by route template and status",
            &["method", "endpoint", "status_code"],
        )?;
        let request_latency = histogram(
            &registry,
            "http_request_duration_seconds",
            "Time spent answering HTTP requests",
            &["method", "endpoint"],
        )?;

        let in_flight = GaugeVec::new(
            Opts::new("http_requests_in_flight", "HTTP requests currently being answered"),
            &["method", "endpoint"],
        )?;
        registry.register(Box::new(in_flight.clone()))?;

        let store_calls = counter(
            &registry,
            "database_operations_total",
            "Restaurant store calls, by operation and backend",
            &["operation", "store", "status"],
        )?;
        let store_latency = histogram(
            &registry,
            "database_operation_duration_seconds",
            "Time spent in restaurant store calls",
            &["operation", "store"],
        )?;

        let auth_attempts = counter(
            &registry,
            "auth_attempts_total",
            "Login and registration attempts",
            &["operation", "outcome"],
        )?;
        let restaurant_operations = counter(
            &registry,
            "restaurant_operations_total",
            "Menu, table and command operations",
            &["operation", "status"],
        )?;

        Ok(Self {
            registry,
            requests,
            request_latency,
            in_flight,
            store_calls,
            store_latency,
            auth_attempts,
            restaurant_operations,
        })
    }

    /// Render every collector in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        seconds: f64,
    ) {
        let status = status_code.to_string();
        self.requests
            .with_label_values(&[method, endpoint, status.as_str()])
            .inc();
        self.request_latency
            .with_label_values(&[method, endpoint])
            .observe(seconds);
    }

    pub fn record_database_operation(
        &self,
        operation: &str,
        store: &str,
        success: bool,
        seconds: f64,
    ) {
        self.store_calls
            .with_label_values(&[operation, store, outcome(success)])
            .inc();
        self.store_latency
            .with_label_values(&[operation, store])
            .observe(seconds);
    }

    /// `outcome` is a short label such as `success`, `rejected` or `error`.
    pub fn record_auth_attempt(&self, operation: &str, outcome: &str) {
        self.auth_attempts
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_restaurant_operation(&self, operation: &str, success: bool) {
        self.restaurant_operations
            .with_label_values(&[operation, outcome(success)])
            .inc();
    }

    pub fn increment_in_flight(&self, method: &str, endpoint: &str) {
        self.in_flight.with_label_values(&[method, endpoint]).inc();
    }

    pub fn decrement_in_flight(&self, method: &str, endpoint: &str) {
        self.in_flight.with_label_values(&[method, endpoint]).dec();
    }
}
