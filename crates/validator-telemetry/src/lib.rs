//! # Validator Telemetry
//!
//! Observability for the validator activator.
//!
//! ## Components
//!
//! - Structured logging through `tracing` (pretty or JSON)
//! - Optional OpenTelemetry trace export over OTLP
//! - Prometheus metrics labelled by validator address
//!
//! ## Usage
//!
//! ```rust,ignore
//! use validator_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).await.expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP collector, export disabled when unset |
//! | `OTEL_SERVICE_NAME` | `validator-activator` | Service name in traces |
//! | `ACTIVATOR_LOG_LEVEL` | `info` | Log level filter |
//! | `ACTIVATOR_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, error_count, metrics_content_type, record_error, register_metrics,
    set_epoch_number, FundingOutcome, MetricsHandle, ValidatorMetrics, ValidatorMetricsSnapshot,
    EPOCH_NUMBER, REGISTRY,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging, optional trace export and the metrics registry.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Initialize metrics first (synchronous)
    let metrics_handle = register_metrics()?;

    let tracing_guard = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
