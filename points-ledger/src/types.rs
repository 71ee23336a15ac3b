//! Core types for the points ledger
//!
//! All amounts are unsigned 64-bit integers: balances can never be
//! represented as negative, and every addition is overflow-checked.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Point amount (whole points, no fractional units)
pub type Points = u64;

/// Principal identifier (chain address, user handle, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Create new address
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Per-user balance, always read and written as one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointBalance {
    /// Freely spendable points
    pub available: Points,

    /// Points committed as collateral
    pub locked: Points,
}

impl PointBalance {
    /// Create a balance from its two halves
    pub fn new(available: Points, locked: Points) -> Self {
        Self { available, locked }
    }

    /// `available + locked`, or `None` if the pair breaks the overflow invariant
    pub fn checked_total(&self) -> Option<Points> {
        self.available.checked_add(self.locked)
    }

    /// `available + locked`
    ///
    /// Every balance produced by the ledger satisfies the overflow invariant,
    /// so the saturation never triggers in practice.
    pub fn total(&self) -> Points {
        self.available.saturating_add(self.locked)
    }

    /// Both halves are zero
    pub fn is_zero(&self) -> bool {
        self.available == 0 && self.locked == 0
    }
}

/// The four mutating ledger operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Issue new points to a user
    Earn,
    /// Consume available points
    Spend,
    /// Move available points to locked
    Lock,
    /// Move locked points back to available
    Unlock,
}

impl Operation {
    /// Stable lowercase name (used for metric labels and logs)
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Earn => "earn",
            Operation::Spend => "spend",
            Operation::Lock => "lock",
            Operation::Unlock => "unlock",
        }
    }

    /// Event kind produced when this operation commits
    pub fn event_kind(&self) -> EventKind {
        match self {
            Operation::Earn => EventKind::Earned,
            Operation::Spend => EventKind::Spent,
            Operation::Lock => EventKind::Locked,
            Operation::Unlock => EventKind::Unlocked,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event type (one per committed mutation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventKind {
    /// Points issued
    Earned = 1,
    /// Points spent
    Spent = 2,
    /// Points locked as collateral
    Locked = 3,
    /// Collateral released
    Unlocked = 4,
}

impl EventKind {
    /// Operation that produces this event
    pub fn operation(&self) -> Operation {
        match self {
            EventKind::Earned => Operation::Earn,
            EventKind::Spent => Operation::Spend,
            EventKind::Locked => Operation::Lock,
            EventKind::Unlocked => Operation::Unlock,
        }
    }

    /// Net change this event applies to a user's `available + locked`
    pub fn holdings_delta(&self, amount: Points) -> i128 {
        match self {
            EventKind::Earned => amount as i128,
            EventKind::Spent => -(amount as i128),
            EventKind::Locked | EventKind::Unlocked => 0,
        }
    }
}

/// Immutable record of one successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsEvent {
    /// Position in the event log (starts at 1, gap-free)
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Type of event
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Affected user
    pub address: Address,

    /// Points moved by the operation
    pub amount: Points,

    /// Commit timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}
