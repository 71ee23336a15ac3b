//! Persisted-state shape
//!
//! One supply record, the last event sequence and one `Address -> PointBalance`
//! table, sealed with a SHA-256 state root. Where the bytes are stored is up to the host.

use crate::{
    balance::BalanceStore,
    supply::SupplyCounter,
    types::{Address, PointBalance, Points},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Point-in-time export of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Cumulative issuance
    pub total_supply: Points,

    /// Sequence of the last event committed before the snapshot
    pub last_sequence: u64,

    /// Balance table, sorted by address
    pub balances: BTreeMap<Address, PointBalance>,

    /// Digest over supply, sequence and balances
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub(crate) fn capture(
        balances: &BalanceStore,
        supply: &SupplyCounter,
        last_sequence: u64,
    ) -> Self {
        let balances: BTreeMap<Address, PointBalance> = balances
            .iter()
            .map(|(address, balance)| (address.clone(), *balance))
            .collect();
        let total_supply = supply.get();
        let state_root = compute_state_root(total_supply, last_sequence, &balances);

        Self {
            total_supply,
            last_sequence,
            balances,
            state_root,
        }
    }

    /// Check the state root and the ledger invariants
    pub fn verify(&self) -> Result<()> {
        if compute_state_root(self.total_supply, self.last_sequence, &self.balances)
            != self.state_root
        {
            return Err(Error::InvariantViolation(
                "State root does not match snapshot contents".to_string(),
            ));
        }

        // The restored log must still be able to number one more event
        if self.last_sequence == u64::MAX {
            return Err(Error::InvariantViolation(
                "last_sequence leaves no room for further events".to_string(),
            ));
        }

        let mut holdings: u128 = 0;
        for (address, balance) in &self.balances {
            let total = balance.checked_total().ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "available + locked overflows for {}",
                    address
                ))
            })?;
            holdings += total as u128;
        }

        // Holdings are issued points minus spent points
        if holdings > self.total_supply as u128 {
            return Err(Error::InvariantViolation(format!(
                "Holdings {} exceed total supply {}",
                holdings, self.total_supply
            )));
        }

        Ok(())
    }

    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode with bincode and verify
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = bincode::deserialize(bytes)?;
        snapshot.verify()?;
        Ok(snapshot)
    }
}

/// SHA-256 over supply, last sequence, then each `(address, available, locked)`
/// in address order
pub fn compute_state_root(
    total_supply: Points,
    last_sequence: u64,
    balances: &BTreeMap<Address, PointBalance>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"points-ledger/v2");
    hasher.update(total_supply.to_be_bytes());
    hasher.update(last_sequence.to_be_bytes());
    hasher.update((balances.len() as u64).to_be_bytes());

    for (address, balance) in balances {
        let id = address.as_str().as_bytes();
        hasher.update((id.len() as u64).to_be_bytes());
        hasher.update(id);
        hasher.update(balance.available.to_be_bytes());
        hasher.update(balance.locked.to_be_bytes());
    }

    hasher.finalize().into()
}
