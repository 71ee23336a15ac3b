//! Cumulative issuance counter

use crate::{types::Points, Error, Result};

/// Total points ever issued through `earn`
///
/// This is cumulative issuance, not circulating balance: spending does not
/// decrement it. There is no decrement operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupplyCounter {
    total: Points,
}

impl SupplyCounter {
    /// Counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_total(total: Points) -> Self {
        Self { total }
    }

    /// Current total
    pub fn get(&self) -> Points {
        self.total
    }

    /// Value after adding `amount`, without committing it
    pub fn checked_next(&self, amount: Points) -> Result<Points> {
        self.total
            .checked_add(amount)
            .ok_or_else(|| Error::overflow("total_supply + amount"))
    }

    /// Add `amount`; the counter is unchanged on overflow
    pub fn increment(&mut self, amount: Points) -> Result<()> {
        self.total = self.checked_next(amount)?;
        Ok(())
    }
}
