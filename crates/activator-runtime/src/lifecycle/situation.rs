//! Pure classification of a node observation.

use node_gateway::{ValidatorRecord, LUNA_PER_NIM};

use crate::config::NetworkMode;

/// Stake required to register a validator, in NIM.
pub const ACTIVATION_STAKE_NIM: u64 = 100_000;

/// Blocks a jailed validator stays jailed.
pub const JAIL_WINDOW_BLOCKS: u64 = 8_000;

/// Fee attached to lifecycle transactions, in Luna.
pub const TX_FEE_LUNA: u64 = 500;

/// Validity start height meaning "from the current block".
pub const VALIDITY_START_NOW: &str = "+0";

/// What the node reported for the validator address on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// No validator entry exists; only the account balance is known.
    Unregistered { balance: u64 },
    /// A validator entry exists. `current_block` is only fetched when the
    /// entry carries a jail marker.
    Registered {
        record: ValidatorRecord,
        current_block: Option<u64>,
    },
}

/// Derived state of the validator. Never stored between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSituation {
    /// Not registered and able to pay the deposit.
    Unregistered,
    /// Not registered, `missing` Luna short of the deposit.
    InsufficientBalance { missing: u64 },
    Active,
    Retired,
    Jailed { jailed_from: u64, release_block: u64 },
}

impl LifecycleSituation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleSituation::Unregistered => "unregistered",
            LifecycleSituation::InsufficientBalance { .. } => "insufficient_balance",
            LifecycleSituation::Active => "active",
            LifecycleSituation::Retired => "retired",
            LifecycleSituation::Jailed { .. } => "jailed",
        }
    }
}

/// Corrective action taken for a situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Activate,
    Reactivate,
    RequestFunding,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Activate => "activate",
            LifecycleAction::Reactivate => "reactivate",
            LifecycleAction::RequestFunding => "funding",
        }
    }
}

/// Thresholds and constants the controller decides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub activation_threshold_luna: u64,
    pub jail_window_blocks: u64,
    pub fee_luna: u64,
    pub network: NetworkMode,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::for_network(NetworkMode::Testnet)
    }
}

impl LifecyclePolicy {
    pub fn for_network(network: NetworkMode) -> Self {
        Self {
            activation_threshold_luna: ACTIVATION_STAKE_NIM * LUNA_PER_NIM,
            jail_window_blocks: JAIL_WINDOW_BLOCKS,
            fee_luna: TX_FEE_LUNA,
            network,
        }
    }

    /// Luna still needed for the deposit, 0 once the balance suffices.
    pub fn missing_balance(&self, balance: u64) -> u64 {
        self.activation_threshold_luna.saturating_sub(balance)
    }

    /// Jail marker and release block if the record is inside its jail window.
    ///
    /// An unknown current block keeps the validator jailed.
    pub fn active_jail(&self, record: &ValidatorRecord, current_block: Option<u64>) -> Option<(u64, u64)> {
        let jailed_from = record.jailed_from?;
        let release_block = jailed_from.saturating_add(self.jail_window_blocks);
        match current_block {
            Some(current) if current.saturating_sub(jailed_from) >= self.jail_window_blocks => None,
            _ => Some((jailed_from, release_block)),
        }
    }

    pub fn classify(&self, observation: &Observation) -> LifecycleSituation {
        match observation {
            Observation::Unregistered { balance } => match self.missing_balance(*balance) {
                0 => LifecycleSituation::Unregistered,
                missing => LifecycleSituation::InsufficientBalance { missing },
            },
            // Retirement wins over any jail marker.
            Observation::Registered { record, .. } if record.retired => LifecycleSituation::Retired,
            Observation::Registered {
                record,
                current_block,
            } => match self.active_jail(record, *current_block) {
                Some((jailed_from, release_block)) => LifecycleSituation::Jailed {
                    jailed_from,
                    release_block,
                },
                None => LifecycleSituation::Active,
            },
        }
    }

    /// The single corrective action for a situation, if any.
    pub fn action_for(&self, situation: &LifecycleSituation) -> Option<LifecycleAction> {
        match situation {
            LifecycleSituation::Unregistered => Some(LifecycleAction::Activate),
            LifecycleSituation::Retired => Some(LifecycleAction::Reactivate),
            LifecycleSituation::InsufficientBalance { .. } if !self.network.is_production() => {
                Some(LifecycleAction::RequestFunding)
            }
            _ => None,
        }
    }
}
