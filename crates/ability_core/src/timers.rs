//! Scheduled events evaluated against the simulation clock.
//!
//! Every timed effect (buff expiry, burn ticks, revival lapse) is an entry
//! in the affected unit's [`TimerQueue`]. Nothing ever blocks: each tick
//! the simulation pops the entries whose time has come. Cancelling an
//! effect is removing its entry, and because the queue is plain data it
//! survives a serialization round-trip unchanged.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffId;
use crate::math::{fixed_serde, Fixed};

/// Identifier of a scheduled entry, unique per queue.
pub type TimerId = u64;

/// Identifier of a damage-over-time record, unique per unit.
pub type DotId = u64;

/// What happens when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimedEvent {
    /// Revert and remove a timed buff.
    BuffExpiry {
        /// Buff on the owning unit.
        buff: BuffId,
    },
    /// Apply one tick of a damage-over-time effect.
    DotTick {
        /// Damage-over-time record on the owning unit.
        dot: DotId,
    },
    /// A revived unit's borrowed time is up.
    RevivalLapse,
}

/// One pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Entry identifier.
    pub id: TimerId,
    /// Simulation time the entry fires at.
    #[serde(with = "fixed_serde")]
    pub at: Fixed,
    /// Effect to run.
    pub event: TimedEvent,
}

/// Pending timed events, ordered by `(at, id)`.
///
/// Entries scheduled for the same instant fire in scheduling order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct TimerQueue {
    entries: Vec<ScheduledEvent>,
    next_id: TimerId,
}

impl TimerQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` at simulation time `at`.
    pub fn schedule(&mut self, at: Fixed, event: TimedEvent) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        let index = self
            .entries
            .partition_point(|entry| (entry.at, entry.id) <= (at, id));
        self.entries.insert(index, ScheduledEvent { id, at, event });
        id
    }

    /// Cancel one entry. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Cancel every entry whose event matches `predicate`.
    pub fn cancel_where(&mut self, predicate: impl Fn(&TimedEvent) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(&entry.event));
        before - self.entries.len()
    }

    /// Pop the earliest entry due at or before `now`.
    pub fn pop_due(&mut self, now: Fixed) -> Option<ScheduledEvent> {
        if self.entries.first()?.at <= now {
            Some(self.entries.remove(0))
        } else {
            None
        }
    }

    /// Time of the earliest pending entry.
    #[must_use]
    pub fn next_due_at(&self) -> Option<Fixed> {
        self.entries.first().map(|entry| entry.at)
    }

    /// Check if an entry for `event` is pending.
    #[must_use]
    pub fn contains(&self, event: &TimedEvent) -> bool {
        self.entries.iter().any(|entry| &entry.event == event)
    }

    /// Drop every pending entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate pending entries in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.entries.iter()
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
