//! # Supervisor
//!
//! Drives the lifecycle controller on a fixed interval. When a tick finds the
//! address unregistered and underfunded, the supervisor switches to the
//! balance-accumulation loop until the deposit is available or the address
//! shows up as a validator, then evaluates once more.
//!
//! Shutdown is honoured between ticks and inside the balance-accumulation
//! loop. Lifecycle actions are never interrupted half way.

use std::time::Duration;

use node_gateway::{luna_to_nim, NodeGateway};
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};
use validator_telemetry::record_error;

use crate::funding::FundingProvider;
use crate::keys::KeyProvider;
use crate::lifecycle::{FundingStatus, LifecycleController, LifecycleSituation, TickReport};

pub struct Supervisor<G, K, F> {
    controller: LifecycleController<G, K, F>,
    poll_interval: Duration,
    funding_interval: Duration,
}

impl<G, K, F> Supervisor<G, K, F>
where
    G: NodeGateway,
    K: KeyProvider,
    F: FundingProvider,
{
    pub fn new(
        controller: LifecycleController<G, K, F>,
        poll_interval: Duration,
        funding_interval: Duration,
    ) -> Self {
        Self {
            controller,
            poll_interval,
            funding_interval,
        }
    }

    pub fn controller(&self) -> &LifecycleController<G, K, F> {
        &self.controller
    }

    /// Run until `shutdown` flips to true.
    ///
    /// Gauges are reset first; the first tick fires immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.controller.reset_metrics();

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut shutdown).await;
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }
        info!("Shutdown signal received, stopping lifecycle loop");
    }

    /// One main-loop iteration: epoch, evaluation, total stake.
    pub async fn tick(&self, shutdown: &mut watch::Receiver<bool>) -> Option<TickReport> {
        if let Err(e) = self.controller.publish_epoch().await {
            warn!(error = %e, "Failed to update epoch number");
        }

        let report = match self.controller.evaluate().await {
            Ok(report) => Some(self.follow_up(report, shutdown).await),
            Err(e) => {
                warn!(error = %e, "Something went wrong with the validator");
                None
            }
        };

        if let Err(e) = self.controller.publish_total_stake().await {
            warn!(error = %e, "Failed to update total stake");
        }

        report
    }

    async fn follow_up(
        &self,
        report: TickReport,
        shutdown: &mut watch::Receiver<bool>,
    ) -> TickReport {
        if !matches!(
            report.situation,
            LifecycleSituation::InsufficientBalance { .. }
        ) {
            return report;
        }

        if self.accumulate_balance(shutdown).await.is_none() {
            return report;
        }

        match self.controller.evaluate().await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Evaluation after funding failed");
                report
            }
        }
    }

    /// Wait for the deposit, requesting funds once per iteration outside
    /// production.
    ///
    /// Returns the number of iterations it took, or `None` if `shutdown`
    /// fired first.
    pub async fn accumulate_balance(&self, shutdown: &mut watch::Receiver<bool>) -> Option<u64> {
        let production = self.controller.policy().network.is_production();
        let mut ticker = interval_at(Instant::now() + self.funding_interval, self.funding_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iterations = 0u64;

        loop {
            if *shutdown.borrow() {
                return None;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("Shutdown signal received, leaving funding loop");
                    return None;
                }
            }
            iterations += 1;

            match self.controller.funding_status().await {
                Ok(FundingStatus::Registered) => {
                    info!("Address registered as validator, leaving funding loop");
                    return Some(iterations);
                }
                Ok(FundingStatus::Sufficient { balance }) => {
                    info!(balance_nim = luna_to_nim(balance), "Sufficient balance detected");
                    return Some(iterations);
                }
                Ok(FundingStatus::Missing { balance, missing }) => {
                    info!(
                        balance_nim = luna_to_nim(balance),
                        missing_nim = luna_to_nim(missing),
                        wait_secs = self.funding_interval.as_secs(),
                        "Insufficient balance, waiting for next check"
                    );
                    if !production {
                        if let Err(e) = self.controller.request_funding().await {
                            warn!(error = %e, "Funding request failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Balance check failed, retrying next interval");
                    record_error("funding_status");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkMode;
    use crate::lifecycle::LifecyclePolicy;
    use crate::test_support::{controller, record, MockFaucet, MockGateway, MockKeys};
    use node_gateway::LUNA_PER_NIM;
    use std::sync::Arc;
    use validator_telemetry::error_count;

    const POLL: Duration = Duration::from_secs(15);
    const FUNDING: Duration = Duration::from_secs(10);

    fn supervisor(
        gateway: &Arc<MockGateway>,
        faucet: &Arc<MockFaucet>,
        network: NetworkMode,
    ) -> Supervisor<MockGateway, MockKeys, MockFaucet> {
        let keys = Arc::new(MockKeys::default());
        Supervisor::new(
            controller(gateway, &keys, faucet, LifecyclePolicy::for_network(network)),
            POLL,
            FUNDING,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_funding_request_per_iteration() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-FUND"));
        gateway.push_balances([
            40_000 * LUNA_PER_NIM,
            60_000 * LUNA_PER_NIM,
            80_000 * LUNA_PER_NIM,
            100_000 * LUNA_PER_NIM,
        ]);
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Testnet);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let started = Instant::now();
        let iterations = supervisor.accumulate_balance(&mut shutdown).await;

        assert_eq!(iterations, Some(4));
        assert_eq!(faucet.requests(), 3);
        assert_eq!(started.elapsed(), FUNDING * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_funding_loop_exits_on_registration() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-REGISTERED"));
        gateway.set_validator(Some(record("NQ-SV-REGISTERED")));
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Testnet);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        assert_eq!(supervisor.accumulate_balance(&mut shutdown).await, Some(1));
        assert_eq!(faucet.requests(), 0);
        assert_eq!(gateway.calls("getAccountByAddress"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_funding_loop_survives_balance_check_errors() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-CHECK-ERR"));
        gateway.fail("getValidatorByAddress");
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Testnet);
        let (_shutdown_tx, mut shutdown) = watch::channel(false);
        let errors_before = error_count("funding_status");

        let result = tokio::time::timeout(
            FUNDING * 3 + Duration::from_secs(1),
            supervisor.accumulate_balance(&mut shutdown),
        )
        .await;

        assert!(result.is_err(), "loop has no retry limit");
        assert_eq!(gateway.calls("getValidatorByAddress"), 3);
        assert_eq!(faucet.requests(), 0);
        assert_eq!(error_count("funding_status"), errors_before + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_production_waits_without_funding() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-MAINNET"));
        gateway.push_balances([0, 0, 100_000 * LUNA_PER_NIM]);
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Mainnet);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        assert_eq!(supervisor.accumulate_balance(&mut shutdown).await, Some(3));
        assert_eq!(faucet.requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_underfunded_tick_ends_with_activation() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-TICK"));
        gateway.set_balance(40_000 * LUNA_PER_NIM);
        let faucet = Arc::new(MockFaucet::topping_up(
            Arc::clone(&gateway),
            100_000 * LUNA_PER_NIM,
        ));
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Testnet);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        let report = supervisor.tick(&mut shutdown).await.unwrap();

        // The tick's own funding request already topped the account up.
        assert_eq!(faucet.requests(), 1);
        assert_eq!(report.situation, LifecycleSituation::Unregistered);
        assert!(report.action.unwrap().succeeded());
        assert_eq!(gateway.calls("sendRawTransaction"), 1);
        assert_eq!(gateway.calls("getStakersByValidatorAddress"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_evaluation_keeps_going() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-FAIL"));
        gateway.fail("getValidatorByAddress");
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = supervisor(&gateway, &faucet, NetworkMode::Testnet);

        let (_shutdown_tx, mut shutdown) = watch::channel(false);

        assert!(supervisor.tick(&mut shutdown).await.is_none());
        assert_eq!(gateway.calls("getEpochNumber"), 1);
        assert_eq!(gateway.calls("getStakersByValidatorAddress"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval_until_shutdown() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-RUN"));
        gateway.set_validator(Some(record("NQ-SV-RUN")));
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = Arc::new(supervisor(&gateway, &faucet, NetworkMode::Testnet));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.run(shutdown_rx).await })
        };

        // Ticks at 0s, 15s and 30s.
        tokio::time::sleep(POLL * 2 + Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(gateway.calls("getValidatorByAddress"), 3);
        assert_eq!(gateway.calls("getEpochNumber"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_leaves_funding_loop() {
        let gateway = Arc::new(MockGateway::new("NQ-SV-FUND-STOP"));
        gateway.set_balance(40_000 * LUNA_PER_NIM);
        let faucet = Arc::new(MockFaucet::default());
        let supervisor = Arc::new(supervisor(&gateway, &faucet, NetworkMode::Testnet));
        let (shutdown_tx, mut shutdown) = watch::channel(false);

        let handle = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.accumulate_balance(&mut shutdown).await })
        };

        tokio::time::sleep(FUNDING * 2 + Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(faucet.requests(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_while_waiting_for_funds() {
        for network in [NetworkMode::Testnet, NetworkMode::Mainnet] {
            let gateway = Arc::new(MockGateway::new("NQ-SV-RUN-UNDERFUNDED"));
            gateway.set_balance(40_000 * LUNA_PER_NIM);
            let faucet = Arc::new(MockFaucet::default());
            let supervisor = Arc::new(supervisor(&gateway, &faucet, network));
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let handle = {
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move { supervisor.run(shutdown_rx).await })
            };

            // The first tick is inside the funding loop by now.
            tokio::time::sleep(Duration::from_secs(25)).await;
            shutdown_tx.send(true).unwrap();

            let stopped = tokio::time::timeout(FUNDING, handle).await;
            assert!(stopped.is_ok(), "run kept going after shutdown on {:?}", network);
            // No evaluation after the interrupted wait.
            assert_eq!(gateway.calls("sendNewValidatorTransaction"), 0);
            assert_eq!(gateway.calls("getEpochNumber"), 1);
        }
    }
}
