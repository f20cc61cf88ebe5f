//! Transition history tracking.
//!
//! Keeps a bounded, ordered log of the panel's accepted transitions for the
//! control panel and for diagnostics. Reassertions are not transitions and
//! are never recorded.

use super::origin::Origin;
use super::state::PanelState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Record of a single accepted transition.
///
/// # Example
///
/// ```rust
/// use alarm_panel::core::{ArmMode, Origin, PanelState, TransitionRecord};
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     sequence: 1,
///     from: PanelState::Disarmed,
///     to: PanelState::Armed(ArmMode::Home),
///     origin: Origin::ManualOrSensor,
///     timestamp: Utc::now(),
/// };
/// assert!(record.changed_state());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Sequence number of the change notification this record belongs to
    pub sequence: u64,
    pub from: PanelState,
    pub to: PanelState,
    pub origin: Origin,
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    /// False when only a field outside the derived view moved, such as the
    /// target changing while the posture stays the same.
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }
}

/// Ordered, bounded history of transitions.
///
/// Once `capacity` records are held, recording a new one evicts the oldest.
///
/// # Example
///
/// ```rust
/// use alarm_panel::core::{ArmMode, Origin, PanelState, TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::with_capacity(8);
/// history.record(TransitionRecord {
///     sequence: 1,
///     from: PanelState::Disarmed,
///     to: PanelState::Armed(ArmMode::Night),
///     origin: Origin::ManualOrSensor,
///     timestamp: Utc::now(),
/// });
///
/// let path = history.path();
/// assert_eq!(path, vec![&PanelState::Disarmed, &PanelState::Armed(ArmMode::Night)]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    capacity: usize,
    transitions: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TransitionHistory {
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, transition: TransitionRecord) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// States traversed: the oldest retained `from`, then each `to`.
    pub fn path(&self) -> Vec<&PanelState> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        path.extend(self.transitions.iter().map(|t| &t.to));
        path
    }

    /// Time between the oldest and newest retained records.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.transitions.back()
    }

    pub fn transitions(&self) -> impl ExactSizeIterator<Item = &TransitionRecord> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
