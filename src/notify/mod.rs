//! Observer notification sink.
//!
//! The panel pushes a [`StateChange`] to every subscribed [`StateObserver`]
//! once per accepted transition and once per reassertion. Dispatch happens
//! after the panel has released its state lock, so observers may read the
//! panel, and `sequence` gives them the order the changes were made in.
//! Observers must not call request operations from `state_changed`; the
//! accessory and HTTP layers only update their own view.

use crate::core::{Origin, Request, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;
use uuid::Uuid;

/// Why a change was published.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    /// An accepted transition changed the state.
    Transition,
    /// A request was refused; the unchanged state is republished so
    /// optimistic observers roll back.
    Reassertion,
}

/// A confirmed state pushed to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Strictly increasing across all changes of one panel
    pub sequence: u64,
    pub event_id: Uuid,
    pub at: DateTime<Utc>,
    /// Origin of the transition; always internal for reassertions
    pub origin: Origin,
    pub cause: ChangeCause,
    /// The request that led here
    pub request: Request,
    pub state: Snapshot,
}

impl StateChange {
    pub(crate) fn new(
        sequence: u64,
        origin: Origin,
        cause: ChangeCause,
        request: Request,
        state: Snapshot,
    ) -> Self {
        Self {
            sequence,
            event_id: Uuid::new_v4(),
            at: Utc::now(),
            origin,
            cause,
            request,
            state,
        }
    }

    pub fn is_reassertion(&self) -> bool {
        self.cause == ChangeCause::Reassertion
    }
}

/// Receives every confirmed change of the panel.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, change: &StateChange);
}

impl<F> StateObserver for F
where
    F: Fn(&StateChange) + Send + Sync,
{
    fn state_changed(&self, change: &StateChange) {
        self(change)
    }
}

/// Logs every change at `info`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl StateObserver for TracingObserver {
    fn state_changed(&self, change: &StateChange) {
        info!(
            sequence = change.sequence,
            event_id = %change.event_id,
            origin = %change.origin,
            cause = ?change.cause,
            request = %change.request,
            current = ?change.state.current,
            target = %change.state.target,
            tripped = change.state.tripped,
            alarming = change.state.alarming,
            arming = change.state.arming,
            "panel state published"
        );
    }
}

/// Subscriber list shared by a panel and its clones.
#[derive(Default)]
pub(crate) struct Observers {
    list: RwLock<Vec<Arc<dyn StateObserver>>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Arc<dyn StateObserver>) {
        self.list
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub(crate) fn len(&self) -> usize {
        self.list.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn dispatch(&self, changes: &[StateChange]) {
        if changes.is_empty() {
            return;
        }
        let observers = self
            .list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for change in changes {
            for observer in &observers {
                observer.state_changed(change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SecurityState, TargetMode};
    use std::sync::Mutex;

    fn change(sequence: u64, cause: ChangeCause) -> StateChange {
        StateChange::new(
            sequence,
            Origin::InternalLogic,
            cause,
            Request::ArmMode(TargetMode::Disarm),
            SecurityState::new().snapshot(),
        )
    }

    #[test]
    fn closures_are_observers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observers = Observers::default();
        observers.add(Arc::new(move |change: &StateChange| {
            sink.lock().unwrap().push(change.sequence);
        }));

        observers.dispatch(&[
            change(1, ChangeCause::Transition),
            change(2, ChangeCause::Reassertion),
        ]);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(observers.len(), 1);
    }

    #[test]
    fn every_observer_sees_every_change() {
        let count = Arc::new(Mutex::new(0));
        let observers = Observers::default();
        for _ in 0..3 {
            let count = Arc::clone(&count);
            observers.add(Arc::new(move |_: &StateChange| {
                *count.lock().unwrap() += 1;
            }));
        }

        observers.dispatch(&[
            change(1, ChangeCause::Transition),
            change(2, ChangeCause::Transition),
        ]);
        assert_eq!(*count.lock().unwrap(), 6);
    }

    #[test]
    fn event_ids_are_unique() {
        let a = change(1, ChangeCause::Transition);
        let b = change(1, ChangeCause::Transition);
        assert_ne!(a.event_id, b.event_id);
        assert!(change(3, ChangeCause::Reassertion).is_reassertion());
    }
}
