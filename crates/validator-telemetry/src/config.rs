//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging, tracing export and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// OpenTelemetry OTLP endpoint. Trace export is disabled when unset.
    pub otlp_endpoint: Option<String>,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Network identifier, attached to exported traces
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "validator-activator".to_string(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: validator-activator)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector endpoint (default: unset, export off)
    /// - `ACTIVATOR_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `ACTIVATOR_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `ACTIVATOR_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `NIMIQ_NETWORK`: Network name (default: testnet)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "validator-activator".to_string()),

            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            log_level: env::var("ACTIVATOR_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("ACTIVATOR_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),

            json_logs: env::var("ACTIVATOR_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            network: env::var("NIMIQ_NETWORK").unwrap_or_else(|_| "testnet".to_string()),
        }
    }

    /// Whether spans are exported to an OTLP collector.
    pub fn exports_traces(&self) -> bool {
        self.otlp_endpoint.is_some()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
