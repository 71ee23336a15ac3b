//! Points Ledger Core
//!
//! Accounting core for the loyalty-points platform: per-user point balances,
//! the cumulative issuance counter, and the formula that converts staking
//! activity into newly issued points.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor task owns the [`Ledger`] and serializes every call
//! - **Atomic Operations**: Balance, supply and event log change together or not at all
//! - **Event Stream**: Every committed mutation is appended to an ordered [`EventLog`]
//! - **Checked Arithmetic**: Overflow is an error, never a wraparound
//!
//! # Invariants
//!
//! - `available + locked` never overflows `u64`
//! - `lock`/`unlock` move points between sub-balances without changing the total
//! - Total supply never decreases; it grows only on `earn`
//! - Failed operations leave no observable side effects

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod formula;
pub mod balance;
pub mod supply;
pub mod events;
pub mod ledger;
pub mod snapshot;
pub mod actor;
pub mod service;
pub mod access;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{Address, EventKind, PointBalance, Points, PointsEvent};
pub use formula::{calculate_points_to_earn, PointsFormula, SCALING_DIVISOR};
pub use balance::BalanceStore;
pub use supply::SupplyCounter;
pub use events::EventLog;
pub use ledger::Ledger;
pub use snapshot::LedgerSnapshot;
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use service::PointsLedger;
pub use access::{Capability, GatedLedger, GovernanceCap, Operation};
pub use config::Config;
pub use metrics::Metrics;
