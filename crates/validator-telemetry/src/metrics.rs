//! Prometheus metrics for the validator activator.
//!
//! Metric names are kept stable for existing dashboards: `nimiq_<subject>_<metric>`.
//! Everything that describes the validator is labelled by `address`.
//!
//! ## Metric Types
//!
//! - **Gauge**: last observed value (balance, stakers, jail state)
//! - **Counter**: monotonically increasing (activations, reactivations)

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CHAIN METRICS
    // =========================================================================

    /// Current epoch reported by the node
    pub static ref EPOCH_NUMBER: Gauge = Gauge::new(
        "nimiq_epoch_number",
        "Current Nimiq epoch number."
    ).expect("metric creation failed");

    // =========================================================================
    // ACCOUNT METRICS
    // =========================================================================

    /// Account balance of the validator address in Luna
    pub static ref ACCOUNT_BALANCE: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_balance_luna", "Current balance of the validator in Luna."),
        &["address"]
    ).expect("metric creation failed");

    /// Sum of all stakes delegated to the validator in Luna
    pub static ref TOTAL_STAKE: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_stake_balance_luna", "Current stake balance of the validator in Luna."),
        &["address"]
    ).expect("metric creation failed");

    // =========================================================================
    // VALIDATOR RECORD METRICS
    // =========================================================================

    /// Deposit recorded on the validator entry
    pub static ref VALIDATOR_BALANCE: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_balance", "Balance of the validator in Luna."),
        &["address"]
    ).expect("metric creation failed");

    pub static ref NUM_STAKERS: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_num_stakers", "Number of stakers for the validator."),
        &["address"]
    ).expect("metric creation failed");

    pub static ref INACTIVITY_FLAG: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_inactivity_flag", "Inactivity flag for the validator, 0 if active."),
        &["address"]
    ).expect("metric creation failed");

    pub static ref RETIRED: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_retired", "Whether the validator is retired, 1 for yes, 0 for no."),
        &["address"]
    ).expect("metric creation failed");

    pub static ref JAILED: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_jailed", "Whether the validator is inside its jail window, 1 for yes, 0 for no."),
        &["address"]
    ).expect("metric creation failed");

    pub static ref JAILED_FROM: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_jailed_from", "Block number from which the validator is jailed, 0 if not jailed."),
        &["address"]
    ).expect("metric creation failed");

    // =========================================================================
    // LIFECYCLE METRICS
    // =========================================================================

    pub static ref ACTIVATED: GaugeVec = GaugeVec::new(
        Opts::new("nimiq_validator_activated", "Activation status of a Nimiq validator. 1 indicates activated."),
        &["address"]
    ).expect("metric creation failed");

    /// Successful activation transactions
    pub static ref ACTIVATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("nimiq_validator_activated_counter", "Number of activation transactions sent for a Nimiq validator."),
        &["address"]
    ).expect("metric creation failed");

    /// Successful reactivation transactions
    pub static ref REACTIVATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("nimiq_validator_reactivated_counter", "Number of reactivation transactions sent for a Nimiq validator."),
        &["address"]
    ).expect("metric creation failed");

    /// Faucet requests by outcome
    pub static ref FUNDING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("nimiq_validator_funding_requests_total", "Faucet funding requests issued for the validator."),
        &["address", "outcome"]  // outcome: success/failure
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Failed operations by name
    pub static ref ACTIVATOR_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("nimiq_activator_errors_total", "Failed activator operations by operation name."),
        &["operation"]
    ).expect("metric creation failed");

    static ref REGISTRATION: Result<(), String> = register_all();
}

fn register_all() -> Result<(), String> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Chain
        Box::new(EPOCH_NUMBER.clone()),
        // Account
        Box::new(ACCOUNT_BALANCE.clone()),
        Box::new(TOTAL_STAKE.clone()),
        // Validator record
        Box::new(VALIDATOR_BALANCE.clone()),
        Box::new(NUM_STAKERS.clone()),
        Box::new(INACTIVITY_FLAG.clone()),
        Box::new(RETIRED.clone()),
        Box::new(JAILED.clone()),
        Box::new(JAILED_FROM.clone()),
        // Lifecycle
        Box::new(ACTIVATED.clone()),
        Box::new(ACTIVATIONS.clone()),
        Box::new(REACTIVATIONS.clone()),
        Box::new(FUNDING_REQUESTS.clone()),
        // Errors
        Box::new(ACTIVATOR_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY.register(metric).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registration happens once per process; later calls return the outcome of
/// the first one.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    REGISTRATION
        .clone()
        .map_err(TelemetryError::MetricsInit)?;

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Content type of [`encode_metrics`] output.
pub fn metrics_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

/// Publish the current epoch number.
pub fn set_epoch_number(epoch: u64) {
    EPOCH_NUMBER.set(epoch as f64);
}

/// Count a failed operation.
pub fn record_error(operation: &str) {
    ACTIVATOR_ERRORS.with_label_values(&[operation]).inc();
}

/// Failures counted so far for `operation`.
pub fn error_count(operation: &str) -> u64 {
    ACTIVATOR_ERRORS.with_label_values(&[operation]).get()
}

/// Outcome label for funding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingOutcome {
    Success,
    Failure,
}

impl FundingOutcome {
    fn as_label(self) -> &'static str {
        match self {
            FundingOutcome::Success => "success",
            FundingOutcome::Failure => "failure",
        }
    }
}

/// Accessor for every metric labelled with one validator address.
///
/// Optional chain values (inactivity flag, jail marker) are converted to the
/// `0` sentinel here and nowhere else.
#[derive(Debug, Clone)]
pub struct ValidatorMetrics {
    address: String,
}

impl ValidatorMetrics {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn labels(&self) -> [&str; 1] {
        [self.address.as_str()]
    }

    /// Start-up state: not activated, counters present at zero.
    pub fn reset_lifecycle(&self) {
        ACTIVATED.with_label_values(&self.labels()).set(0.0);
        // Touching the counters makes them visible to scrapes at 0.
        ACTIVATIONS.with_label_values(&self.labels());
        REACTIVATIONS.with_label_values(&self.labels());
    }

    pub fn set_account_balance(&self, luna: u64) {
        ACCOUNT_BALANCE
            .with_label_values(&self.labels())
            .set(luna as f64);
    }

    pub fn set_total_stake(&self, luna: u64) {
        TOTAL_STAKE.with_label_values(&self.labels()).set(luna as f64);
    }

    pub fn set_validator_balance(&self, luna: u64) {
        VALIDATOR_BALANCE
            .with_label_values(&self.labels())
            .set(luna as f64);
    }

    pub fn set_num_stakers(&self, stakers: u64) {
        NUM_STAKERS
            .with_label_values(&self.labels())
            .set(stakers as f64);
    }

    pub fn set_inactivity_flag(&self, flag: Option<u64>) {
        INACTIVITY_FLAG
            .with_label_values(&self.labels())
            .set(flag.unwrap_or(0) as f64);
    }

    pub fn set_retired(&self, retired: bool) {
        RETIRED
            .with_label_values(&self.labels())
            .set(if retired { 1.0 } else { 0.0 });
    }

    /// `Some(block)` marks the validator as jailed since `block`; `None` clears both gauges.
    pub fn set_jailed(&self, jailed_from: Option<u64>) {
        let (jailed, from) = match jailed_from {
            Some(block) => (1.0, block as f64),
            None => (0.0, 0.0),
        };
        JAILED.with_label_values(&self.labels()).set(jailed);
        JAILED_FROM.with_label_values(&self.labels()).set(from);
    }

    pub fn set_activated(&self, activated: bool) {
        ACTIVATED
            .with_label_values(&self.labels())
            .set(if activated { 1.0 } else { 0.0 });
    }

    pub fn record_activation(&self) {
        ACTIVATED.with_label_values(&self.labels()).set(1.0);
        ACTIVATIONS.with_label_values(&self.labels()).inc();
    }

    pub fn record_reactivation(&self) {
        REACTIVATIONS.with_label_values(&self.labels()).inc();
    }

    pub fn record_funding(&self, outcome: FundingOutcome) {
        FUNDING_REQUESTS
            .with_label_values(&[self.address.as_str(), outcome.as_label()])
            .inc();
    }

    /// Read back every value published for this address.
    pub fn snapshot(&self) -> ValidatorMetricsSnapshot {
        let labels = self.labels();
        ValidatorMetricsSnapshot {
            account_balance: ACCOUNT_BALANCE.with_label_values(&labels).get(),
            total_stake: TOTAL_STAKE.with_label_values(&labels).get(),
            validator_balance: VALIDATOR_BALANCE.with_label_values(&labels).get(),
            num_stakers: NUM_STAKERS.with_label_values(&labels).get(),
            inactivity_flag: INACTIVITY_FLAG.with_label_values(&labels).get(),
            retired: RETIRED.with_label_values(&labels).get(),
            jailed: JAILED.with_label_values(&labels).get(),
            jailed_from: JAILED_FROM.with_label_values(&labels).get(),
            activated: ACTIVATED.with_label_values(&labels).get(),
            activations: ACTIVATIONS.with_label_values(&labels).get(),
            reactivations: REACTIVATIONS.with_label_values(&labels).get(),
            funding_successes: FUNDING_REQUESTS
                .with_label_values(&[self.address.as_str(), FundingOutcome::Success.as_label()])
                .get(),
            funding_failures: FUNDING_REQUESTS
                .with_label_values(&[self.address.as_str(), FundingOutcome::Failure.as_label()])
                .get(),
        }
    }
}

/// Point-in-time copy of the per-address metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorMetricsSnapshot {
    pub account_balance: f64,
    pub total_stake: f64,
    pub validator_balance: f64,
    pub num_stakers: f64,
    pub inactivity_flag: f64,
    pub retired: f64,
    pub jailed: f64,
    pub jailed_from: f64,
    pub activated: f64,
    pub activations: u64,
    pub reactivations: u64,
    pub funding_successes: u64,
    pub funding_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_errors_are_counted_per_operation() {
        let before = error_count("telemetry-test");
        record_error("telemetry-test");
        record_error("telemetry-test");
        assert_eq!(error_count("telemetry-test"), before + 2);
        assert_eq!(error_count("telemetry-test-untouched"), 0);
    }

    #[test]
    fn test_optional_values_become_zero() {
        let metrics = ValidatorMetrics::new("NQ00 TEST OPTIONAL");
        metrics.set_inactivity_flag(None);
        metrics.set_jailed(None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.inactivity_flag, 0.0);
        assert_eq!(snapshot.jailed, 0.0);
        assert_eq!(snapshot.jailed_from, 0.0);
    }

    #[test]
    fn test_jailed_sets_both_gauges() {
        let metrics = ValidatorMetrics::new("NQ00 TEST JAILED");
        metrics.set_jailed(Some(100));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jailed, 1.0);
        assert_eq!(snapshot.jailed_from, 100.0);

        metrics.set_jailed(None);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jailed, 0.0);
        assert_eq!(snapshot.jailed_from, 0.0);
    }

    #[test]
    fn test_activation_sets_gauge_and_counter() {
        let metrics = ValidatorMetrics::new("NQ00 TEST ACTIVATION");
        metrics.reset_lifecycle();
        assert_eq!(metrics.snapshot().activated, 0.0);
        assert_eq!(metrics.snapshot().activations, 0);

        metrics.record_activation();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.activated, 1.0);
        assert_eq!(snapshot.activations, 1);
    }

    #[test]
    fn test_funding_outcomes_are_separate_series() {
        let metrics = ValidatorMetrics::new("NQ00 TEST FUNDING");
        metrics.record_funding(FundingOutcome::Success);
        metrics.record_funding(FundingOutcome::Failure);
        metrics.record_funding(FundingOutcome::Failure);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.funding_successes, 1);
        assert_eq!(snapshot.funding_failures, 2);
    }

    #[test]
    fn test_encode_contains_labelled_series() {
        register_metrics().unwrap();
        let metrics = ValidatorMetrics::new("NQ00 TEST ENCODE");
        metrics.set_account_balance(42);

        let text = encode_metrics().unwrap();
        assert!(text.contains("nimiq_validator_balance_luna"));
        assert!(text.contains("NQ00 TEST ENCODE"));
    }
}
