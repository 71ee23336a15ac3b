//! Ledger lifecycle
//!
//! [`PointsLedger`] is the process-wide instance: opened once at startup,
//! passed explicitly to whatever needs it, and torn down with
//! [`PointsLedger::shutdown`]. There is no global.
//!
//! # Example
//!
//! ```no_run
//! use points_ledger::{Address, Config, PointsLedger};
//!
//! #[tokio::main]
//! async fn main() -> points_ledger::Result<()> {
//!     let (ledger, _governance) = PointsLedger::open(Config::default())?;
//!
//!     let user = Address::new("0xa11ce");
//!     ledger.earn_for_stake(&user, 50_000_000, 365, 1).await?;
//!
//!     let final_state = ledger.shutdown().await?;
//!     assert_eq!(final_state.get_total_supply(), 2);
//!     Ok(())
//! }
//! ```

use crate::{
    access::{GatedLedger, GovernanceCap},
    actor::{spawn_ledger_actor, LedgerHandle},
    formula::PointsFormula,
    ledger::Ledger,
    metrics::Metrics,
    snapshot::LedgerSnapshot,
    types::{Address, Points, PointsEvent},
    Config, Error, Result,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Running ledger instance
#[derive(Debug)]
pub struct PointsLedger {
    /// Instance ID (capabilities are bound to it)
    id: Uuid,

    /// Actor handle
    handle: LedgerHandle,

    /// Actor task, resolves to the final state
    task: JoinHandle<Ledger>,

    /// Configured reward formula
    formula: PointsFormula,

    /// Activity metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl PointsLedger {
    /// Open an empty ledger
    ///
    /// Returns the single [`GovernanceCap`] for this instance. Must be called
    /// from within a Tokio runtime.
    pub fn open(config: Config) -> Result<(Self, GovernanceCap)> {
        config.validate()?;
        let ledger = Ledger::with_channel_capacity(config.events.channel_capacity);
        Self::start(config, ledger)
    }

    /// Open a ledger restored from a snapshot
    pub fn restore(config: Config, snapshot: &LedgerSnapshot) -> Result<(Self, GovernanceCap)> {
        config.validate()?;
        let ledger = Ledger::from_snapshot(snapshot, config.events.channel_capacity)?;
        tracing::info!(
            total_supply = snapshot.total_supply,
            accounts = snapshot.balances.len(),
            "Restored ledger from snapshot"
        );
        Self::start(config, ledger)
    }

    fn start(config: Config, ledger: Ledger) -> Result<(Self, GovernanceCap)> {
        let formula = config.formula.formula()?;
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        let (handle, task) =
            spawn_ledger_actor(ledger, metrics.clone(), config.actor.mailbox_capacity);
        let id = Uuid::now_v7();

        tracing::info!(
            ledger_id = %id,
            service = %config.service_name,
            version = %config.service_version,
            "Points ledger opened"
        );

        let service = Self {
            id,
            handle,
            task,
            formula,
            metrics,
            config,
        };
        Ok((service, GovernanceCap::mint(id)))
    }

    /// Instance ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ungated handle for trusted callers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Handle that checks a capability on every mutation
    pub fn gated(&self) -> GatedLedger {
        GatedLedger::new(self.handle.clone(), self.id)
    }

    /// Configured reward formula
    pub fn formula(&self) -> PointsFormula {
        self.formula
    }

    /// Activity metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Points awarded for a staking position under the configured divisor
    pub fn points_for_stake(
        &self,
        amount: u64,
        duration_days: u64,
        participation_level: u64,
    ) -> Result<Points> {
        self.formula
            .calculate(amount, duration_days, participation_level)
    }

    /// Compute a staking award and issue it in one call
    pub async fn earn_for_stake(
        &self,
        address: &Address,
        amount: u64,
        duration_days: u64,
        participation_level: u64,
    ) -> Result<Option<PointsEvent>> {
        let points = self.points_for_stake(amount, duration_days, participation_level)?;
        self.handle.earn(address, points).await
    }

    /// Stop the actor and return the final ledger state
    pub async fn shutdown(self) -> Result<Ledger> {
        self.handle.shutdown().await?;
        let ledger = self
            .task
            .await
            .map_err(|e| Error::Concurrency(format!("Ledger actor failed: {}", e)))?;
        tracing::info!(ledger_id = %self.id, "Points ledger closed");
        Ok(ledger)
    }
}

impl std::ops::Deref for PointsLedger {
    type Target = LedgerHandle;

    fn deref(&self) -> &LedgerHandle {
        &self.handle
    }
}
