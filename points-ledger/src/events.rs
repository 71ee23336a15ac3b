//! Append-only event log
//!
//! Every committed mutation is recorded here with a gap-free sequence number
//! and published to live subscribers. Subscribers that lag behind the
//! broadcast buffer can catch up with [`EventLog::events_since`].
//!
//! Retention is unbounded: the log keeps every event committed since the
//! ledger was opened or restored, and `events_since` clones the requested
//! tail. Hosts that need a bounded history should snapshot and restore,
//! which starts a fresh log at the snapshot's sequence.

use crate::{
    types::{Address, EventKind, Points, PointsEvent},
    Error, Result,
};
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default broadcast buffer for live subscribers
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Ordered record of committed mutations
#[derive(Debug)]
pub struct EventLog {
    /// Events retained since the log was created or restored
    entries: Vec<PointsEvent>,

    /// Sequence assigned to the next append
    next_sequence: u64,

    /// Live fan-out to subscribers
    sender: broadcast::Sender<PointsEvent>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventLog {
    /// Empty log; the first event gets sequence 1
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_next_sequence(1, channel_capacity)
    }

    /// Empty log continuing a sequence that already reached `last_sequence`
    pub fn starting_after(last_sequence: u64, channel_capacity: usize) -> Result<Self> {
        let next_sequence = last_sequence
            .checked_add(1)
            .ok_or_else(|| Error::overflow("last_sequence + 1"))?;
        Ok(Self::with_next_sequence(next_sequence, channel_capacity))
    }

    fn with_next_sequence(next_sequence: u64, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            entries: Vec::new(),
            next_sequence,
            sender,
        }
    }

    /// Append an event and publish it
    ///
    /// Cannot fail: having no live subscribers is not an error.
    pub(crate) fn append(&mut self, kind: EventKind, address: &Address, amount: Points) -> PointsEvent {
        let event = PointsEvent {
            sequence: self.next_sequence,
            event_id: Uuid::now_v7(),
            kind,
            address: address.clone(),
            amount,
            timestamp_nanos: Utc::now().timestamp_nanos_opt().unwrap_or(0),
        };
        self.next_sequence += 1;
        self.entries.push(event.clone());

        let _ = self.sender.send(event.clone());
        event
    }

    /// Receive every event appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PointsEvent> {
        self.sender.subscribe()
    }

    /// Sender half, for handing out subscriptions without borrowing the log
    pub(crate) fn sender(&self) -> broadcast::Sender<PointsEvent> {
        self.sender.clone()
    }

    /// Sequence of the most recent event (0 if none)
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    /// Retained events with `sequence > after`, in order
    pub fn events_since(&self, after: u64) -> Vec<PointsEvent> {
        let start = self.entries.partition_point(|e| e.sequence <= after);
        self.entries[start..].to_vec()
    }

    /// All retained events
    pub fn entries(&self) -> &[PointsEvent] {
        &self.entries
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No retained events
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_are_gap_free() {
        let mut log = EventLog::default();
        let alice = Address::new("alice");

        let first = log.append(EventKind::Earned, &alice, 10);
        let second = log.append(EventKind::Spent, &alice, 4);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(log.last_sequence(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_events_since() {
        let mut log = EventLog::default();
        let alice = Address::new("alice");
        for amount in 1..=5 {
            log.append(EventKind::Earned, &alice, amount);
        }

        let tail = log.events_since(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 4);
        assert_eq!(tail[1].amount, 5);
        assert!(log.events_since(5).is_empty());
        assert_eq!(log.events_since(0).len(), 5);
    }

    #[test]
    fn test_restored_log_continues_sequence() {
        let mut log = EventLog::starting_after(41, 16).unwrap();
        assert_eq!(log.last_sequence(), 41);

        let event = log.append(EventKind::Locked, &Address::new("bob"), 1);
        assert_eq!(event.sequence, 42);
        assert_eq!(log.events_since(0).len(), 1);
    }

    #[test]
    fn test_exhausted_sequence_is_overflow() {
        let err = EventLog::starting_after(u64::MAX, 16).unwrap_err();
        assert!(matches!(err, Error::Overflow(_)));
        let log = EventLog::starting_after(u64::MAX - 1, 16).unwrap();
        assert_eq!(log.last_sequence(), u64::MAX - 1);
    }

    #[test]
    fn test_subscriber_receives_appended_events() {
        let mut log = EventLog::new(8);
        let mut rx = log.subscribe();

        log.append(EventKind::Earned, &Address::new("carol"), 99);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.kind, EventKind::Earned);
        assert_eq!(received.amount, 99);
    }
}
