//! Capability-gated access to the ledger
//!
//! The core trusts its caller. Hosts that want the ledger itself to refuse
//! unauthorized mutations wrap the [`LedgerHandle`] in a [`GatedLedger`],
//! which checks an explicit [`Capability`] on every mutating call before
//! delegating. Capabilities can only be issued through the single
//! [`GovernanceCap`] minted when the ledger is opened, and are bound to that
//! ledger instance.
//!
//! Which engine receives which capability is the host's policy.

use crate::{
    actor::LedgerHandle,
    types::{Address, PointBalance, Points, PointsEvent},
    Error, Result,
};
use std::collections::BTreeSet;
use uuid::Uuid;

pub use crate::types::Operation;

/// Governance object allowed to issue capabilities
///
/// Not `Clone`: exactly one exists per opened ledger.
#[derive(Debug)]
pub struct GovernanceCap {
    ledger_id: Uuid,
}

impl GovernanceCap {
    pub(crate) fn mint(ledger_id: Uuid) -> Self {
        Self { ledger_id }
    }

    /// Ledger this governance object belongs to
    pub fn ledger_id(&self) -> Uuid {
        self.ledger_id
    }

    /// Issue a capability granting `operations`
    pub fn issue(&self, operations: impl IntoIterator<Item = Operation>) -> Capability {
        let capability = Capability {
            id: Uuid::now_v7(),
            ledger_id: self.ledger_id,
            operations: operations.into_iter().collect(),
        };
        tracing::info!(
            capability_id = %capability.id,
            operations = ?capability.operations,
            "Issued ledger capability"
        );
        capability
    }

    /// Issue a capability granting every operation
    pub fn issue_all(&self) -> Capability {
        self.issue([
            Operation::Earn,
            Operation::Spend,
            Operation::Lock,
            Operation::Unlock,
        ])
    }
}

/// Permission to invoke a set of mutating operations on one ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    id: Uuid,
    ledger_id: Uuid,
    operations: BTreeSet<Operation>,
}

impl Capability {
    /// Capability ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether `operation` is granted
    pub fn allows(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Granted operations
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.operations.iter().copied()
    }
}

/// Ledger handle that requires a capability for every mutation
#[derive(Debug, Clone)]
pub struct GatedLedger {
    inner: LedgerHandle,
    ledger_id: Uuid,
}

impl GatedLedger {
    /// Wrap a handle belonging to `ledger_id`
    pub fn new(inner: LedgerHandle, ledger_id: Uuid) -> Self {
        Self { inner, ledger_id }
    }

    /// Reject unless `capability` grants `operation` on this ledger
    pub fn authorize(&self, capability: &Capability, operation: Operation) -> Result<()> {
        if capability.ledger_id != self.ledger_id {
            return Err(Error::Unauthorized(format!(
                "capability {} was issued for another ledger",
                capability.id
            )));
        }
        if !capability.allows(operation) {
            return Err(Error::Unauthorized(format!(
                "capability {} does not grant {}",
                capability.id, operation
            )));
        }
        Ok(())
    }

    /// Apply one mutation after checking `capability`
    pub async fn apply(
        &self,
        capability: &Capability,
        operation: Operation,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        if let Err(e) = self.authorize(capability, operation) {
            tracing::warn!(%address, amount, "Refused {}: {}", operation, e);
            return Err(e);
        }
        self.inner.apply(operation, address, amount).await
    }

    /// Issue new points
    pub async fn earn(
        &self,
        capability: &Capability,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        self.apply(capability, Operation::Earn, address, amount).await
    }

    /// Consume available points
    pub async fn spend(
        &self,
        capability: &Capability,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        self.apply(capability, Operation::Spend, address, amount).await
    }

    /// Lock available points as collateral
    pub async fn lock(
        &self,
        capability: &Capability,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        self.apply(capability, Operation::Lock, address, amount).await
    }

    /// Release locked points
    pub async fn unlock(
        &self,
        capability: &Capability,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        self.apply(capability, Operation::Unlock, address, amount).await
    }

    /// `(available, locked)` pair (reads are not gated)
    pub async fn get_balance(&self, address: &Address) -> Result<PointBalance> {
        self.inner.get_balance(address).await
    }

    /// Cumulative points ever issued
    pub async fn get_total_supply(&self) -> Result<Points> {
        self.inner.get_total_supply().await
    }

    /// Underlying ungated handle
    pub fn inner(&self) -> &LedgerHandle {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{actor::spawn_ledger_actor, Ledger, Metrics};

    #[test]
    fn test_capability_grants() {
        let governance = GovernanceCap::mint(Uuid::now_v7());
        let staking = governance.issue([Operation::Earn]);
        let full = governance.issue_all();

        assert!(staking.allows(Operation::Earn));
        assert!(!staking.allows(Operation::Spend));
        assert_eq!(full.operations().count(), 4);
        assert_ne!(staking.id(), full.id());
    }

    #[tokio::test]
    async fn test_gated_ledger_enforces_capabilities() {
        let ledger_id = Uuid::now_v7();
        let governance = GovernanceCap::mint(ledger_id);
        let (handle, join) = spawn_ledger_actor(Ledger::new(), Metrics::new().unwrap(), 16);
        let gated = GatedLedger::new(handle.clone(), ledger_id);

        let staking = governance.issue([Operation::Earn]);
        let marketplace = governance.issue([Operation::Spend]);
        let user = Address::new("userX");

        gated.earn(&staking, &user, 100).await.unwrap();
        let err = gated.spend(&staking, &user, 10).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        gated.spend(&marketplace, &user, 10).await.unwrap();
        assert_eq!(gated.get_balance(&user).await.unwrap().available, 90);

        // Refused calls never reach the ledger
        assert_eq!(handle.events_since(0).await.unwrap().len(), 2);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_capability_rejected() {
        let foreign = GovernanceCap::mint(Uuid::now_v7()).issue_all();
        let (handle, join) = spawn_ledger_actor(Ledger::new(), Metrics::new().unwrap(), 16);
        let gated = GatedLedger::new(handle.clone(), Uuid::now_v7());

        let err = gated
            .earn(&foreign, &Address::new("userX"), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("another ledger"));
        assert_eq!(gated.get_total_supply().await.unwrap(), 0);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }
}
