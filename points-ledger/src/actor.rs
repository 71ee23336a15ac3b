//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One task owns the [`Ledger`]; no two calls ever interleave
//! - Reads go through the same mailbox, so they see the latest commit
//! - Bounded mailbox gives backpressure to callers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │   Staking engine · Marketplace · Lending engine       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ earn / spend / lock / unlock
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   Ledger::apply → BalanceStore + Supply + EventLog    │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ broadcast
//!                       ▼
//!              activity feed / indexers
//! ```

use crate::{
    ledger::Ledger,
    metrics::Metrics,
    snapshot::LedgerSnapshot,
    types::{Address, Operation, PointBalance, Points, PointsEvent},
    Error, Result,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Apply one mutation
    Mutate {
        operation: Operation,
        address: Address,
        amount: Points,
        response: oneshot::Sender<Result<Option<PointsEvent>>>,
    },

    /// Read a balance pair
    GetBalance {
        address: Address,
        response: oneshot::Sender<PointBalance>,
    },

    /// Read cumulative issuance
    GetTotalSupply {
        response: oneshot::Sender<Points>,
    },

    /// Read retained events after a sequence number
    EventsSince {
        after: u64,
        response: oneshot::Sender<Vec<PointsEvent>>,
    },

    /// Export the persisted-state shape
    Snapshot {
        response: oneshot::Sender<LedgerSnapshot>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the ledger
#[derive(Debug)]
pub struct LedgerActor {
    /// The only copy of ledger state
    ledger: Ledger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Activity metrics
    metrics: Metrics,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: Ledger, mailbox: mpsc::Receiver<LedgerMessage>, metrics: Metrics) -> Self {
        metrics.update_gauges(ledger.get_total_supply(), ledger.balances().len());
        Self {
            ledger,
            mailbox,
            metrics,
        }
    }

    /// Run the actor event loop; returns the ledger on shutdown
    pub async fn run(mut self) -> Ledger {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => {
                    tracing::info!(
                        total_supply = self.ledger.get_total_supply(),
                        last_sequence = self.ledger.events().last_sequence(),
                        "Ledger actor shutting down"
                    );
                    break;
                }
                msg => self.handle_message(msg),
            }
        }

        self.ledger
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Mutate {
                operation,
                address,
                amount,
                response,
            } => {
                let result = self.ledger.apply(operation, &address, amount);
                match &result {
                    Ok(Some(_)) => {
                        self.metrics.record_commit(operation, amount);
                        self.metrics.update_gauges(
                            self.ledger.get_total_supply(),
                            self.ledger.balances().len(),
                        );
                    }
                    Ok(None) => {}
                    Err(_) => self.metrics.record_rejection(operation),
                }
                let _ = response.send(result);
            }

            LedgerMessage::GetBalance { address, response } => {
                let _ = response.send(self.ledger.get_balance(&address));
            }

            LedgerMessage::GetTotalSupply { response } => {
                let _ = response.send(self.ledger.get_total_supply());
            }

            LedgerMessage::EventsSince { after, response } => {
                let _ = response.send(self.ledger.events().events_since(after));
            }

            LedgerMessage::Snapshot { response } => {
                let _ = response.send(self.ledger.snapshot());
            }

            LedgerMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
    events: broadcast::Sender<PointsEvent>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>, events: broadcast::Sender<PointsEvent>) -> Self {
        Self { sender, events }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Apply one mutation
    pub async fn apply(
        &self,
        operation: Operation,
        address: &Address,
        amount: Points,
    ) -> Result<Option<PointsEvent>> {
        self.request(|response| LedgerMessage::Mutate {
            operation,
            address: address.clone(),
            amount,
            response,
        })
        .await?
    }

    /// Issue new points
    pub async fn earn(&self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Earn, address, amount).await
    }

    /// Consume available points
    pub async fn spend(&self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Spend, address, amount).await
    }

    /// Lock available points as collateral
    pub async fn lock(&self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Lock, address, amount).await
    }

    /// Release locked points
    pub async fn unlock(&self, address: &Address, amount: Points) -> Result<Option<PointsEvent>> {
        self.apply(Operation::Unlock, address, amount).await
    }

    /// `(available, locked)` pair, read as one unit
    pub async fn get_balance(&self, address: &Address) -> Result<PointBalance> {
        self.request(|response| LedgerMessage::GetBalance {
            address: address.clone(),
            response,
        })
        .await
    }

    /// Freely spendable points
    pub async fn get_available_balance(&self, address: &Address) -> Result<Points> {
        Ok(self.get_balance(address).await?.available)
    }

    /// Points committed as collateral
    pub async fn get_locked_balance(&self, address: &Address) -> Result<Points> {
        Ok(self.get_balance(address).await?.locked)
    }

    /// `available + locked`
    pub async fn get_total_balance(&self, address: &Address) -> Result<Points> {
        Ok(self.get_balance(address).await?.total())
    }

    /// Cumulative points ever issued
    pub async fn get_total_supply(&self) -> Result<Points> {
        self.request(|response| LedgerMessage::GetTotalSupply { response })
            .await
    }

    /// Retained events with `sequence > after`
    pub async fn events_since(&self, after: u64) -> Result<Vec<PointsEvent>> {
        self.request(|response| LedgerMessage::EventsSince { after, response })
            .await
    }

    /// Export the persisted-state shape
    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Receive every event committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PointsEvent> {
        self.events.subscribe()
    }

    /// Event subscription as a `Stream`
    pub fn event_stream(&self) -> BroadcastStream<PointsEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
///
/// The join handle resolves to the final ledger state after shutdown.
pub fn spawn_ledger_actor(
    ledger: Ledger,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> (LedgerHandle, JoinHandle<Ledger>) {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let events = ledger.event_sender();
    let actor = LedgerActor::new(ledger, rx, metrics);

    let join = tokio::spawn(actor.run());

    (LedgerHandle::new(tx, events), join)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;

    fn spawn_test_actor() -> (LedgerHandle, JoinHandle<Ledger>, Metrics) {
        let metrics = Metrics::new().unwrap();
        let (handle, join) = spawn_ledger_actor(Ledger::new(), metrics.clone(), 16);
        (handle, join, metrics)
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, join, _) = spawn_test_actor();

        handle.shutdown().await.unwrap();
        let ledger = join.await.unwrap();
        assert_eq!(ledger.get_total_supply(), 0);

        // Mailbox is gone after shutdown
        let err = handle.get_total_supply().await.unwrap_err();
        assert!(matches!(err, Error::Concurrency(_)));
    }

    #[tokio::test]
    async fn test_actor_mutations_and_reads() {
        let (handle, join, metrics) = spawn_test_actor();
        let user = Address::new("userX");

        handle.earn(&user, 1000).await.unwrap();
        handle.lock(&user, 250).await.unwrap();

        assert_eq!(handle.get_available_balance(&user).await.unwrap(), 750);
        assert_eq!(handle.get_locked_balance(&user).await.unwrap(), 250);
        assert_eq!(handle.get_total_balance(&user).await.unwrap(), 1000);
        assert_eq!(handle.get_total_supply().await.unwrap(), 1000);
        assert_eq!(metrics.earned_total.get(), 1000);
        assert_eq!(metrics.locked_total.get(), 250);
        assert_eq!(metrics.accounts.get(), 1);

        handle.shutdown().await.unwrap();
        let ledger = join.await.unwrap();
        assert_eq!(ledger.events().len(), 2);
    }

    #[tokio::test]
    async fn test_actor_rejection_recorded() {
        let (handle, join, metrics) = spawn_test_actor();

        let err = handle.spend(&Address::new("userY"), 50).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(metrics.rejected_total.with_label_values(&["spend"]).get(), 1);
        assert!(handle.events_since(0).await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_sees_commits_in_order() {
        let (handle, join, _) = spawn_test_actor();
        let mut rx = handle.subscribe();
        let user = Address::new("userX");

        handle.earn(&user, 10).await.unwrap();
        handle.spend(&user, 0).await.unwrap();
        handle.spend(&user, 3).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.kind, first.sequence), (EventKind::Earned, 1));
        assert_eq!((second.kind, second.sequence), (EventKind::Spent, 2));
        assert!(rx.try_recv().is_err());

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let (handle, join, _) = spawn_test_actor();
        let user = Address::new("shared");

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let handle = handle.clone();
            let user = user.clone();
            tasks.push(tokio::spawn(async move {
                handle.earn(&user, 2).await.unwrap();
                handle.lock(&user, 1).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let balance = handle.get_balance(&user).await.unwrap();
        assert_eq!(balance, PointBalance::new(50, 50));
        assert_eq!(handle.events_since(0).await.unwrap().len(), 100);

        handle.shutdown().await.unwrap();
        join.await.unwrap();
    }
}
