//! # Validator Lifecycle
//!
//! Each evaluation queries the node, classifies the observation into one
//! [`LifecycleSituation`], republishes the derived metrics and performs at
//! most one corrective action.
//!
//! | Situation | Action |
//! |-----------|--------|
//! | `Unregistered` | activate |
//! | `InsufficientBalance` | request funding (non-production only) |
//! | `Active` | none |
//! | `Retired` | reactivate |
//! | `Jailed` | none, wait for the jail window to pass |

mod controller;
mod situation;


pub use controller::{
    ActionOutcome, FundingStatus, LifecycleController, LifecycleDependencies, LifecycleError,
    TickReport,
};
pub use situation::{
    LifecycleAction, LifecyclePolicy, LifecycleSituation, Observation, ACTIVATION_STAKE_NIM,
    JAIL_WINDOW_BLOCKS, TX_FEE_LUNA, VALIDITY_START_NOW,
};
