//! Delay timer manager.
//!
//! One logical slot per [`TimerKind`]. Scheduling a kind cancels whatever was
//! pending in that slot, and every schedule hands out a fresh [`TimerToken`].
//! A firing timer must [`claim`](DelayTimers::claim) its token before acting;
//! a token that is no longer in its slot is stale, so only the most recently
//! scheduled instance of a kind can ever take effect, even if an older task
//! woke up just before it was aborted.
//!
//! Timers run as detached Tokio tasks. They never keep the runtime alive and
//! are aborted when the manager is dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The two delayed transitions the panel schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Grace period between an away-arm request and being armed away.
    ArmDelay,
    /// Grace period between a trip and the alarm sounding.
    AlarmDelay,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArmDelay => f.write_str("arm_delay"),
            Self::AlarmDelay => f.write_str("alarm_delay"),
        }
    }
}

/// What a timer asserts if it is still current when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueState {
    ArmedAway,
    Alarming,
}

/// Identifies one scheduled instance of a timer kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub kind: TimerKind,
    generation: u64,
}

struct PendingTimer {
    token: TimerToken,
    due: DueState,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Per-kind timer slots.
pub struct DelayTimers {
    runtime: Handle,
    arm_delay: Option<PendingTimer>,
    alarm_delay: Option<PendingTimer>,
    next_generation: u64,
}

impl DelayTimers {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            arm_delay: None,
            alarm_delay: None,
            next_generation: 0,
        }
    }

    fn slot(&self, kind: TimerKind) -> &Option<PendingTimer> {
        match kind {
            TimerKind::ArmDelay => &self.arm_delay,
            TimerKind::AlarmDelay => &self.alarm_delay,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<PendingTimer> {
        match kind {
            TimerKind::ArmDelay => &mut self.arm_delay,
            TimerKind::AlarmDelay => &mut self.alarm_delay,
        }
    }

    /// Cancel any pending timer of `kind`, then start a new one.
    ///
    /// `on_fire` runs once on a runtime task after `delay`, unless the timer
    /// is cancelled or superseded first. It receives the token it must claim.
    pub fn schedule<F>(
        &mut self,
        kind: TimerKind,
        delay: Duration,
        due: DueState,
        on_fire: F,
    ) -> TimerToken
    where
        F: FnOnce(TimerToken) + Send + 'static,
    {
        if self.cancel(kind) {
            debug!(timer = %kind, "superseded pending timer");
        }

        self.next_generation += 1;
        let token = TimerToken {
            kind,
            generation: self.next_generation,
        };
        let now = Instant::now();
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(token);
        });

        *self.slot_mut(kind) = Some(PendingTimer {
            token,
            due,
            deadline,
            handle,
        });
        debug!(timer = %kind, delay_ms = delay.as_millis() as u64, "timer scheduled");
        token
    }

    /// Cancel the pending timer of `kind`. Returns whether one was pending.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.slot_mut(kind).take() {
            Some(pending) => {
                pending.handle.abort();
                debug!(timer = %kind, "timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::ArmDelay);
        self.cancel(TimerKind::AlarmDelay);
    }

    /// Consume the slot if `token` is still the current timer of its kind.
    ///
    /// Returns the due state to apply, or `None` when the token was
    /// cancelled or superseded.
    pub fn claim(&mut self, token: TimerToken) -> Option<DueState> {
        let slot = self.slot_mut(token.kind);
        if slot.as_ref().is_some_and(|pending| pending.token == token) {
            slot.take().map(|pending| pending.due)
        } else {
            None
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    /// Time left before the pending timer of `kind` fires.
    pub fn remaining(&self, kind: TimerKind) -> Option<Duration> {
        self.slot(kind)
            .as_ref()
            .map(|pending| pending.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for DelayTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn timers() -> DelayTimers {
        DelayTimers::new(Handle::current())
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let mut timers = timers();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let token = timers.schedule(
            TimerKind::ArmDelay,
            Duration::from_secs(30),
            DueState::ArmedAway,
            move |token| {
                let _ = tx.send(token);
            },
        );
        assert!(timers.is_pending(TimerKind::ArmDelay));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, token);
        assert_eq!(timers.claim(fired), Some(DueState::ArmedAway));
        assert!(!timers.is_pending(TimerKind::ArmDelay));
        assert_eq!(timers.claim(fired), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing_and_is_idempotent() {
        let mut timers = timers();
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerToken>();

        timers.schedule(
            TimerKind::AlarmDelay,
            Duration::from_secs(5),
            DueState::Alarming,
            move |token| {
                let _ = tx.send(token);
            },
        );
        assert!(timers.cancel(TimerKind::AlarmDelay));
        assert!(!timers.cancel(TimerKind::AlarmDelay));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_keeps_only_newest() {
        let mut timers = timers();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tx2 = tx.clone();

        let first = timers.schedule(
            TimerKind::ArmDelay,
            Duration::from_secs(30),
            DueState::ArmedAway,
            move |token| {
                let _ = tx.send(token);
            },
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = timers.schedule(
            TimerKind::ArmDelay,
            Duration::from_secs(30),
            DueState::ArmedAway,
            move |token| {
                let _ = tx2.send(token);
            },
        );

        // A late wake-up of the first instance cannot claim the slot.
        assert_eq!(timers.claim(first), None);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(rx.try_recv().is_err());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, second);
        assert_eq!(timers.claim(fired), Some(DueState::ArmedAway));
    }

    #[tokio::test(start_paused = true)]
    async fn kinds_are_independent() {
        let mut timers = timers();
        timers.schedule(
            TimerKind::ArmDelay,
            Duration::from_secs(30),
            DueState::ArmedAway,
            |_| {},
        );
        timers.schedule(
            TimerKind::AlarmDelay,
            Duration::from_secs(10),
            DueState::Alarming,
            |_| {},
        );

        timers.cancel(TimerKind::AlarmDelay);
        assert!(timers.is_pending(TimerKind::ArmDelay));
        assert_eq!(
            timers.remaining(TimerKind::ArmDelay),
            Some(Duration::from_secs(30))
        );
        assert_eq!(timers.remaining(TimerKind::AlarmDelay), None);

        timers.cancel_all();
        assert!(!timers.is_pending(TimerKind::ArmDelay));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_delay_is_clamped_instead_of_panicking() {
        let mut timers = timers();
        timers.schedule(
            TimerKind::AlarmDelay,
            Duration::MAX,
            DueState::Alarming,
            |_| {},
        );

        assert!(timers.is_pending(TimerKind::AlarmDelay));
        assert!(timers.remaining(TimerKind::AlarmDelay) <= Some(FAR_FUTURE));
    }
}
