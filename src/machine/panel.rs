//! The security state machine.

use crate::core::rules::{self, Refusal, Verdict};
use crate::core::{
    Origin, PanelPolicy, PanelState, Request, SecurityState, Snapshot, TargetMode,
    TransitionHistory, TransitionRecord, DEFAULT_HISTORY_CAPACITY,
};
use crate::machine::error::{Outcome, PanelError, Rejection, RequestResult};
use crate::notify::{ChangeCause, Observers, StateChange, StateObserver};
use crate::timer::{DelayTimers, DueState, TimerKind, TimerToken};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Delays and policies a panel is built with.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelSettings {
    pub arm_delay: Duration,
    pub alarm_delay: Duration,
    pub policy: PanelPolicy,
    pub history_capacity: usize,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            arm_delay: Duration::from_secs(30),
            alarm_delay: Duration::from_secs(30),
            policy: PanelPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

struct Inner {
    state: SecurityState,
    timers: DelayTimers,
    history: TransitionHistory,
    sequence: u64,
}

impl Inner {
    fn publish(&mut self, origin: Origin, cause: ChangeCause, request: Request) -> StateChange {
        self.sequence += 1;
        StateChange::new(self.sequence, origin, cause, request, self.state.snapshot())
    }
}

struct Shared {
    settings: PanelSettings,
    inner: Mutex<Inner>,
    observers: Observers,
}

/// Handle to the alarm panel.
///
/// Cloning is cheap and every clone drives the same state. All entry points,
/// including timer expiries, serialize on one lock; observers are notified
/// after it is released.
///
/// # Example
///
/// ```rust
/// use alarm_panel::core::{Origin, TargetMode};
/// use alarm_panel::machine::{AlarmPanel, Outcome, PanelSettings};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let panel = AlarmPanel::new(PanelSettings::default()).unwrap();
///
/// let outcome = panel.request_arm_mode(TargetMode::Night, Origin::ManualOrSensor);
/// assert_eq!(outcome, Ok(Outcome::Applied));
///
/// let outcome = panel.request_tripped(true, Origin::ManualOrSensor);
/// assert_eq!(outcome, Ok(Outcome::Scheduled));
/// assert!(panel.state().tripped);
/// # }
/// ```
#[derive(Clone)]
pub struct AlarmPanel {
    shared: Arc<Shared>,
}

impl AlarmPanel {
    /// Create a disarmed panel. Must be called from within a Tokio runtime,
    /// which the delay timers run on.
    pub fn new(settings: PanelSettings) -> Result<Self, PanelError> {
        let runtime = Handle::try_current().map_err(|_| PanelError::NoRuntime)?;
        let inner = Inner {
            state: SecurityState::new(),
            timers: DelayTimers::new(runtime),
            history: TransitionHistory::with_capacity(settings.history_capacity),
            sequence: 0,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                inner: Mutex::new(inner),
                observers: Observers::default(),
            }),
        })
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.shared.settings
    }

    /// Register an observer for every future change.
    pub fn subscribe(&self, observer: Arc<dyn StateObserver>) {
        self.shared.observers.add(observer);
        debug!(observers = self.shared.observers.len(), "observer subscribed");
    }

    pub fn state(&self) -> Snapshot {
        self.lock().state.snapshot()
    }

    pub fn panel_state(&self) -> PanelState {
        self.lock().state.panel_state()
    }

    pub fn history(&self) -> TransitionHistory {
        self.lock().history.clone()
    }

    /// Time left on the pending timer of `kind`, if one is pending.
    pub fn pending_timer(&self, kind: TimerKind) -> Option<Duration> {
        self.lock().timers.remaining(kind)
    }

    /// Request an arm/disarm target.
    ///
    /// Home and night arm immediately and clear any trip or alarm. Away
    /// starts the arm delay; the armed state is observed later. Disarm
    /// cancels both timers and clears everything.
    pub fn request_arm_mode(&self, target: TargetMode, origin: Origin) -> RequestResult {
        self.execute(Request::ArmMode(target), origin)
    }

    /// Request a change of the tripped flag.
    ///
    /// A trip is only registered while armed and not already alarming, and
    /// starts the alarm delay.
    pub fn request_tripped(&self, value: bool, origin: Origin) -> RequestResult {
        self.execute(Request::Tripped(value), origin)
    }

    /// Request a change of the alarming flag. Only internal origins may.
    pub fn request_alarming(&self, value: bool, origin: Origin) -> RequestResult {
        self.execute(Request::Alarming(value), origin)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn execute(&self, request: Request, origin: Origin) -> RequestResult {
        let mut changes = Vec::new();
        let result = {
            let mut inner = self.lock();
            self.decide(&mut inner, request, origin, &mut changes)
        };
        self.shared.observers.dispatch(&changes);
        result
    }

    fn on_timer_fired(&self, token: TimerToken) {
        let mut changes = Vec::new();
        let result = {
            let mut inner = self.lock();
            let Some(due) = inner.timers.claim(token) else {
                debug!(timer = %token.kind, "ignoring superseded timer");
                return;
            };
            info!(timer = %token.kind, "timer expired");
            let request = match due {
                DueState::ArmedAway => Request::ArmMode(TargetMode::Away),
                DueState::Alarming => Request::Alarming(true),
            };
            self.decide(&mut inner, request, Origin::InternalTimer, &mut changes)
        };
        self.shared.observers.dispatch(&changes);

        if let Err(rejection) = result {
            warn!(timer = %token.kind, %rejection, "timer expiry rejected");
        }
    }

    fn decide(
        &self,
        inner: &mut Inner,
        request: Request,
        origin: Origin,
        changes: &mut Vec<StateChange>,
    ) -> RequestResult {
        let policy = &self.shared.settings.policy;
        let verdict = match request {
            Request::ArmMode(target) => rules::arm_mode(target, &inner.state, origin),
            Request::Tripped(value) => rules::tripped(value, &inner.state, origin, policy),
            Request::Alarming(value) => rules::alarming(value, &inner.state, origin),
        };

        match verdict {
            Verdict::Accept => {
                let from = inner.state.panel_state();
                let outcome = self.apply(inner, request, origin);
                let change = inner.publish(origin, ChangeCause::Transition, request);
                let to = inner.state.panel_state();
                let record = TransitionRecord {
                    sequence: change.sequence,
                    from,
                    to,
                    origin,
                    timestamp: change.at,
                };
                if record.changed_state() {
                    info!(%request, %origin, %from, %to, ?outcome, "transition applied");
                } else {
                    debug!(%request, %origin, state = %to, ?outcome, "transition applied, view unchanged");
                }
                if to.is_alarm() && !from.is_alarm() {
                    warn!(%to, "alarm triggered");
                }
                inner.history.record(record);
                changes.push(change);
                Ok(outcome)
            }
            Verdict::NoOp => {
                if request == Request::ArmMode(TargetMode::Disarm) {
                    inner.timers.cancel_all();
                }
                debug!(%request, %origin, "requested value already holds");
                Ok(Outcome::NoOp)
            }
            Verdict::Stale => {
                info!(%request, state = %inner.state.panel_state(), "ignoring stale timer expiry");
                Ok(Outcome::Stale)
            }
            Verdict::Acknowledge => {
                info!(%request, %origin, state = %inner.state.panel_state(), "request refused, reasserting");
                changes.push(inner.publish(Origin::InternalLogic, ChangeCause::Reassertion, request));
                Ok(Outcome::Reasserted)
            }
            Verdict::Refuse(refusal) => {
                let rejection = match refusal {
                    Refusal::WrongState => Rejection::WrongState {
                        request,
                        state: inner.state.panel_state(),
                    },
                    Refusal::InvalidOrigin => Rejection::InvalidOrigin { request, origin },
                };
                info!(%rejection, "request rejected, reasserting");
                changes.push(inner.publish(Origin::InternalLogic, ChangeCause::Reassertion, request));
                Err(rejection)
            }
        }
    }

    fn apply(&self, inner: &mut Inner, request: Request, origin: Origin) -> Outcome {
        let settings = &self.shared.settings;
        match request {
            Request::ArmMode(TargetMode::Away) if origin == Origin::InternalTimer => {
                // Timer-tagged requests do not always come through `claim`.
                inner.timers.cancel(TimerKind::ArmDelay);
                inner.state.mode = TargetMode::Away.arm_mode();
                inner.state.arming = false;
                Outcome::Applied
            }
            Request::ArmMode(TargetMode::Away) => {
                inner.state.target = TargetMode::Away;
                inner.state.arming = true;
                self.schedule(inner, TimerKind::ArmDelay, settings.arm_delay, DueState::ArmedAway);
                Outcome::Scheduled
            }
            Request::ArmMode(target @ (TargetMode::Home | TargetMode::Night)) => {
                inner.timers.cancel_all();
                inner.state = SecurityState {
                    mode: target.arm_mode(),
                    target,
                    ..SecurityState::new()
                };
                Outcome::Applied
            }
            Request::ArmMode(TargetMode::Disarm) => {
                inner.timers.cancel_all();
                inner.state = SecurityState::new();
                Outcome::Applied
            }
            Request::Tripped(true) => {
                inner.state.tripped = true;
                self.schedule(inner, TimerKind::AlarmDelay, settings.alarm_delay, DueState::Alarming);
                Outcome::Scheduled
            }
            Request::Tripped(false) => {
                inner.state.tripped = false;
                inner.timers.cancel(TimerKind::AlarmDelay);
                Outcome::Applied
            }
            Request::Alarming(true) => {
                inner.timers.cancel(TimerKind::AlarmDelay);
                inner.state.alarming = true;
                inner.state.tripped = settings.policy.keep_tripped_while_alarming;
                Outcome::Applied
            }
            Request::Alarming(false) => {
                inner.state.alarming = false;
                Outcome::Applied
            }
        }
    }

    fn schedule(&self, inner: &mut Inner, kind: TimerKind, delay: Duration, due: DueState) {
        let panel = Arc::downgrade(&self.shared);
        inner.timers.schedule(kind, delay, due, move |token| {
            if let Some(shared) = panel.upgrade() {
                AlarmPanel { shared }.on_timer_fired(token);
            }
        });
    }
}
