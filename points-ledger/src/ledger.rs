//! Ledger aggregate and its state transitions
//!
//! [`Ledger`] owns the [`BalanceStore`], the [`SupplyCounter`] and the
//! [`EventLog`], and is the only writer of all three. Each mutator validates
//! every arithmetic step before the first write, so a failed call leaves the
//! ledger byte-for-byte unchanged and records no event.
//!
//! # Example
//!
//! ```
//! use points_ledger::{Address, Ledger};
//!
//! let mut ledger = Ledger::new();
//! let user = Address::new("0xa11ce");
//!
//! ledger.earn(&user, 1_000)?;
//! ledger.lock(&user, 300)?;
//!
//! assert_eq!(ledger.get_available_balance(&user), 700);
//! assert_eq!(ledger.get_total_balance(&user), 1_000);
//! # Ok::<(), points_ledger::Error>(())
//! ```

use crate::{
    balance::BalanceStore,
    events::{EventLog, DEFAULT_CHANNEL_CAPACITY},
    snapshot::LedgerSnapshot,
    supply::SupplyCounter,
    types::{Address, Operation, PointBalance, Points, PointsEvent},
    Error, Result,
};
use tokio::sync::broadcast;

/// Points ledger (aggregate root)
#[derive(Debug, Default)]
pub struct Ledger {
    balances: BalanceStore,
    supply: SupplyCounter,
    events: EventLog,
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Empty ledger with a custom subscriber buffer
    pub fn with_channel_capacity(channel_capacity: usize) -> Self {
        Self {
            balances: BalanceStore::new(),
            supply: SupplyCounter::new(),
            events: EventLog::new(channel_capacity),
        }
    }

    /// Dispatch one mutation
    ///
    /// Returns the recorded event, or `None` for a zero-amount no-op.
    pub fn apply(
        &mut self,
        operation: Operation,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        if amount == 0 {
            return Ok(None);
        }

        let result = match operation {
            Operation::Earn => self.apply_earn(address, amount),
            Operation::Spend => self.apply_spend(address, amount),
            Operation::Lock => self.apply_lock(address, amount),
            Operation::Unlock => self.apply_unlock(address, amount),
        };

        match result {
            Ok(()) => {
                let event = self.events.append(operation.event_kind(), address, amount);
                tracing::debug!(
                    sequence = event.sequence,
                    %address,
                    amount,
                    "Committed {}",
                    operation
                );
                Ok(Some(event))
            }
            Err(e) => {
                tracing::warn!(%address, amount, "Rejected {}: {}", operation, e);
                Err(e)
            }
        }
    }

    /// Issue `amount` new points to `address`
    pub fn earn(&mut self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Earn, address, amount)
    }

    /// Consume `amount` available points
    pub fn spend(&mut self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Spend, address, amount)
    }

    /// Commit `amount` available points as collateral
    pub fn lock(&mut self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Lock, address, amount)
    }

    /// Release `amount` locked points back to available
    pub fn unlock(&mut self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Unlock, address, amount)
    }

    fn apply_earn(&mut self, address: &Address, amount: Points) -> Result<()> {
        let current = self.balances.get(address);
        let available = current
            .available
            .checked_add(amount)
            .ok_or_else(|| Error::overflow("available + amount"))?;
        available
            .checked_add(current.locked)
            .ok_or_else(|| Error::overflow("available + locked"))?;

        // Last fallible step; nothing has been written yet if it fails
        self.supply.increment(amount)?;
        self.balances.get_or_create(address).available = available;
        Ok(())
    }

    fn apply_spend(&mut self, address: &Address, amount: Points) -> Result<()> {
        let balance = available_entry(&mut self.balances, address, amount)?;
        balance.available -= amount;
        Ok(())
    }

    fn apply_lock(&mut self, address: &Address, amount: Points) -> Result<()> {
        let balance = available_entry(&mut self.balances, address, amount)?;
        let locked = balance
            .locked
            .checked_add(amount)
            .ok_or_else(|| Error::overflow("locked + amount"))?;
        balance.available -= amount;
        balance.locked = locked;
        Ok(())
    }

    fn apply_unlock(&mut self, address: &Address, amount: Points) -> Result<()> {
        let balance = match self.balances.get_mut(address) {
            Some(balance) if balance.locked >= amount => balance,
            entry => {
                return Err(Error::InsufficientLockedBalance {
                    address: address.clone(),
                    requested: amount,
                    locked: entry.map_or(0, |b| b.locked),
                })
            }
        };
        let available = balance
            .available
            .checked_add(amount)
            .ok_or_else(|| Error::overflow("available + amount"))?;
        balance.locked -= amount;
        balance.available = available;
        Ok(())
    }

    /// `(available, locked)` pair for `address`, `{0, 0}` if unknown
    pub fn get_balance(&self, address: &Address) -> PointBalance {
        self.balances.get(address)
    }

    /// Freely spendable points
    pub fn get_available_balance(&self, address: &Address) -> Points {
        self.balances.get(address).available
    }

    /// Points committed as collateral
    pub fn get_locked_balance(&self, address: &Address) -> Points {
        self.balances.get(address).locked
    }

    /// `available + locked`
    pub fn get_total_balance(&self, address: &Address) -> Points {
        self.balances.get(address).total()
    }

    /// Cumulative points ever issued (not reduced by `spend`)
    pub fn get_total_supply(&self) -> Points {
        self.supply.get()
    }

    /// Balance table
    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    /// Event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Receive every event committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PointsEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<PointsEvent> {
        self.events.sender()
    }

    /// Export the persisted-state shape
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(&self.balances, &self.supply, self.events.last_sequence())
    }

    /// Rebuild a ledger from a verified snapshot
    ///
    /// The event history is not part of the snapshot; the restored log
    /// continues numbering after `snapshot.last_sequence`.
    pub fn from_snapshot(snapshot: &LedgerSnapshot, channel_capacity: usize) -> Result<Self> {
        snapshot.verify()?;

        Ok(Self {
            balances: snapshot
                .balances
                .iter()
                .map(|(address, balance)| (address.clone(), *balance))
                .collect(),
            supply: SupplyCounter::from_total(snapshot.total_supply),
            events: EventLog::starting_after(snapshot.last_sequence, channel_capacity)?,
        })
    }
}

/// Existing entry with at least `amount` available
fn available_entry<'a>(
    balances: &'a mut BalanceStore,
    address: &Address,
    amount: Points,
) -> Result<&'a mut PointBalance> {
    match balances.get_mut(address) {
        Some(balance) if balance.available >= amount => Ok(balance),
        entry => Err(Error::InsufficientBalance {
            address: address.clone(),
            requested: amount,
            available: entry.map_or(0, |b| b.available),
        }),
    }
}
