//! Per-user balance store
//!
//! Maps an [`Address`] to its `(available, locked)` pair. Entries are created
//! lazily by [`BalanceStore::get_or_create`] and never removed: a zeroed
//! balance is a valid terminal state.

use crate::types::{Address, PointBalance};
use std::collections::HashMap;

/// Keyed balance table
#[derive(Debug, Clone, Default)]
pub struct BalanceStore {
    entries: HashMap<Address, PointBalance>,
}

impl BalanceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance for `address`, `{0, 0}` if unknown
    ///
    /// Reading never creates an entry.
    pub fn get(&self, address: &Address) -> PointBalance {
        self.lookup(address).copied().unwrap_or_default()
    }

    /// Existing entry only
    pub fn lookup(&self, address: &Address) -> Option<&PointBalance> {
        self.entries.get(address)
    }

    /// Mutable entry, created as `{0, 0}` if absent
    pub fn get_or_create(&mut self, address: &Address) -> &mut PointBalance {
        self.entries.entry(address.clone()).or_default()
    }

    /// Mutable existing entry
    pub(crate) fn get_mut(&mut self, address: &Address) -> Option<&mut PointBalance> {
        self.entries.get_mut(address)
    }

    /// Whether an entry exists for `address`
    pub fn contains(&self, address: &Address) -> bool {
        self.lookup(address).is_some()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &PointBalance)> {
        self.entries.iter()
    }

    /// Sum of `available + locked` over all entries, `None` on overflow
    pub fn total_holdings(&self) -> Option<u128> {
        self.entries
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(b.total() as u128))
    }
}

impl FromIterator<(Address, PointBalance)> for BalanceStore {
    fn from_iter<I: IntoIterator<Item = (Address, PointBalance)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_does_not_create() {
        let store = BalanceStore::new();
        let alice = Address::new("alice");

        assert_eq!(store.get(&alice), PointBalance::default());
        assert!(!store.contains(&alice));
        assert!(store.is_empty());
    }

    #[test]
    fn test_lookup_distinguishes_zeroed_entry() {
        let mut store = BalanceStore::new();
        let alice = Address::new("alice");
        assert!(store.lookup(&alice).is_none());

        // A zeroed entry still exists
        store.get_or_create(&alice);
        assert_eq!(store.lookup(&alice), Some(&PointBalance::default()));
        assert_eq!(store.get(&alice), PointBalance::default());
        assert!(store.contains(&alice));
    }

    #[test]
    fn test_get_or_create() {
        let mut store = BalanceStore::new();
        let alice = Address::new("alice");

        store.get_or_create(&alice).available = 100;
        assert_eq!(store.get(&alice), PointBalance::new(100, 0));

        // Second call returns the same entry
        store.get_or_create(&alice).locked = 5;
        assert_eq!(store.get(&alice), PointBalance::new(100, 5));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_total_holdings() {
        let store: BalanceStore = [
            (Address::new("a"), PointBalance::new(10, 5)),
            (Address::new("b"), PointBalance::new(u64::MAX, 0)),
        ]
        .into_iter()
        .collect();

        assert_eq!(store.total_holdings(), Some(u64::MAX as u128 + 15));
    }
}
