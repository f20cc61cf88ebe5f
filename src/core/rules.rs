//! Acceptance rules for transition requests.
//!
//! Every rule here is a pure function of `(request, state, origin, policy)`.
//! The panel applies effects; these functions only decide. Each operation has
//! exactly one exhaustive `match` on the origin so authorization is never
//! re-derived per branch.

use super::origin::Origin;
use super::state::{ArmMode, SecurityState, TargetMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition request as the rules see it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Request {
    ArmMode(TargetMode),
    Tripped(bool),
    Alarming(bool),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArmMode(target) => write!(f, "arm mode {target}"),
            Self::Tripped(value) => write!(f, "tripped={value}"),
            Self::Alarming(value) => write!(f, "alarming={value}"),
        }
    }
}

/// Who may clear a trip without disarming.
///
/// Internal clears are always honored; this only governs `ManualOrSensor`
/// and `ExternalSync` requests for `tripped = false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualClearPolicy {
    /// Only a disarm silences a trip.
    #[default]
    Reject,
    /// A manual clear is honored while armed home, rejected otherwise.
    AllowWhenArmedHome,
    /// Manual clears are always honored.
    Allow,
}

/// How a trip arriving while disarmed or alarming is answered.
///
/// The state never changes and the prior value is always reasserted; the
/// policy only picks what the caller is told.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectedTripPolicy {
    /// The caller receives a wrong-state rejection.
    #[default]
    Reject,
    /// The caller is acknowledged and observers are rolled back.
    Acknowledge,
}

/// Configuration-selectable variations of the acceptance rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPolicy {
    #[serde(default)]
    pub manual_clear: ManualClearPolicy,
    #[serde(default)]
    pub rejected_trip: RejectedTripPolicy,
    /// Leave `tripped` set once the trip escalates to an alarm.
    #[serde(default)]
    pub keep_tripped_while_alarming: bool,
}

/// Why a request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refusal {
    WrongState,
    InvalidOrigin,
}

/// Decision for a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Apply the transition.
    Accept,
    /// The requested value already holds.
    NoOp,
    /// A timer expiry whose premise no longer holds.
    Stale,
    /// Refused, but the caller is acknowledged. Observers get a reassertion.
    Acknowledge,
    /// Refused. Observers get a reassertion.
    Refuse(Refusal),
}

/// Decide a `request_arm_mode` call.
///
/// Repeating the current target is a no-op, except while an away arm is in
/// progress: asking for away again restarts the arm delay. `InternalTimer` is
/// the arm-delay expiry and only completes an away arm that is still the
/// current target.
pub fn arm_mode(target: TargetMode, state: &SecurityState, origin: Origin) -> Verdict {
    match origin {
        Origin::InternalTimer => {
            if !target.is_delayed() {
                Verdict::Refuse(Refusal::InvalidOrigin)
            } else if state.target != target || !state.arming {
                Verdict::Stale
            } else {
                Verdict::Accept
            }
        }
        Origin::ManualOrSensor | Origin::ExternalSync | Origin::InternalLogic => {
            if target == state.target && !state.arming {
                Verdict::NoOp
            } else {
                Verdict::Accept
            }
        }
    }
}

/// Decide a `request_tripped` call.
pub fn tripped(value: bool, state: &SecurityState, origin: Origin, policy: &PanelPolicy) -> Verdict {
    let clear_allowed = match origin {
        Origin::InternalTimer => return Verdict::Refuse(Refusal::InvalidOrigin),
        Origin::InternalLogic => true,
        Origin::ManualOrSensor | Origin::ExternalSync => match policy.manual_clear {
            ManualClearPolicy::Reject => false,
            ManualClearPolicy::AllowWhenArmedHome => state.mode == ArmMode::Home,
            ManualClearPolicy::Allow => true,
        },
    };

    if value == state.tripped {
        return Verdict::NoOp;
    }

    if value {
        if state.mode.is_armed() && !state.alarming {
            Verdict::Accept
        } else {
            match policy.rejected_trip {
                RejectedTripPolicy::Reject => Verdict::Refuse(Refusal::WrongState),
                RejectedTripPolicy::Acknowledge => Verdict::Acknowledge,
            }
        }
    } else if clear_allowed {
        Verdict::Accept
    } else {
        Verdict::Refuse(Refusal::InvalidOrigin)
    }
}

/// Decide a `request_alarming` call.
///
/// Only the alarm-delay timer or the panel's own logic may touch `alarming`.
/// An expiry that finds its trip cleared or the panel disarmed is stale.
pub fn alarming(value: bool, state: &SecurityState, origin: Origin) -> Verdict {
    let refusal = match origin {
        Origin::ManualOrSensor | Origin::ExternalSync => {
            return Verdict::Refuse(Refusal::InvalidOrigin)
        }
        Origin::InternalTimer => Verdict::Stale,
        Origin::InternalLogic => Verdict::Refuse(Refusal::WrongState),
    };

    if value == state.alarming {
        return if origin == Origin::InternalTimer {
            Verdict::Stale
        } else {
            Verdict::NoOp
        };
    }

    if value && !(state.mode.is_armed() && state.tripped) {
        return refusal;
    }
    Verdict::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mode: ArmMode, tripped: bool, alarming: bool) -> SecurityState {
        SecurityState {
            mode,
            target: match mode {
                ArmMode::Disarmed => TargetMode::Disarm,
                ArmMode::Away => TargetMode::Away,
                ArmMode::Home => TargetMode::Home,
                ArmMode::Night => TargetMode::Night,
            },
            tripped,
            alarming,
            arming: false,
        }
    }

    #[test]
    fn same_target_is_noop_for_external_origins() {
        let s = state(ArmMode::Home, false, false);
        assert_eq!(
            arm_mode(TargetMode::Home, &s, Origin::ManualOrSensor),
            Verdict::NoOp
        );
        assert_eq!(
            arm_mode(TargetMode::Night, &s, Origin::ExternalSync),
            Verdict::Accept
        );
    }

    #[test]
    fn repeated_away_request_restarts_arming() {
        let mut s = state(ArmMode::Disarmed, false, false);
        s.target = TargetMode::Away;
        s.arming = true;
        assert_eq!(
            arm_mode(TargetMode::Away, &s, Origin::ManualOrSensor),
            Verdict::Accept
        );

        let armed_away = state(ArmMode::Away, false, false);
        assert_eq!(
            arm_mode(TargetMode::Away, &armed_away, Origin::ManualOrSensor),
            Verdict::NoOp
        );
    }

    #[test]
    fn timer_completes_only_pending_away_arm() {
        let mut s = state(ArmMode::Disarmed, false, false);
        s.target = TargetMode::Away;
        s.arming = true;
        assert_eq!(
            arm_mode(TargetMode::Away, &s, Origin::InternalTimer),
            Verdict::Accept
        );

        s.target = TargetMode::Disarm;
        s.arming = false;
        assert_eq!(
            arm_mode(TargetMode::Away, &s, Origin::InternalTimer),
            Verdict::Stale
        );
        assert_eq!(
            arm_mode(TargetMode::Home, &s, Origin::InternalTimer),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );
    }

    #[test]
    fn trip_requires_armed_and_not_alarming() {
        let policy = PanelPolicy::default();
        assert_eq!(
            tripped(
                true,
                &state(ArmMode::Disarmed, false, false),
                Origin::ManualOrSensor,
                &policy
            ),
            Verdict::Refuse(Refusal::WrongState)
        );
        assert_eq!(
            tripped(
                true,
                &state(ArmMode::Away, false, true),
                Origin::ManualOrSensor,
                &policy
            ),
            Verdict::Refuse(Refusal::WrongState)
        );
        assert_eq!(
            tripped(
                true,
                &state(ArmMode::Night, false, false),
                Origin::ManualOrSensor,
                &policy
            ),
            Verdict::Accept
        );
    }

    #[test]
    fn acknowledge_policy_softens_wrong_state_trip() {
        let policy = PanelPolicy {
            rejected_trip: RejectedTripPolicy::Acknowledge,
            ..PanelPolicy::default()
        };
        assert_eq!(
            tripped(
                true,
                &state(ArmMode::Disarmed, false, false),
                Origin::ExternalSync,
                &policy
            ),
            Verdict::Acknowledge
        );
    }

    #[test]
    fn manual_clear_follows_policy() {
        let home = state(ArmMode::Home, true, false);
        let away = state(ArmMode::Away, true, false);

        let reject = PanelPolicy::default();
        assert_eq!(
            tripped(false, &home, Origin::ManualOrSensor, &reject),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );
        assert_eq!(
            tripped(false, &home, Origin::InternalLogic, &reject),
            Verdict::Accept
        );

        let home_only = PanelPolicy {
            manual_clear: ManualClearPolicy::AllowWhenArmedHome,
            ..PanelPolicy::default()
        };
        assert_eq!(
            tripped(false, &home, Origin::ManualOrSensor, &home_only),
            Verdict::Accept
        );
        assert_eq!(
            tripped(false, &away, Origin::ManualOrSensor, &home_only),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );

        let allow = PanelPolicy {
            manual_clear: ManualClearPolicy::Allow,
            ..PanelPolicy::default()
        };
        assert_eq!(
            tripped(false, &away, Origin::ExternalSync, &allow),
            Verdict::Accept
        );
    }

    #[test]
    fn timers_never_set_tripped() {
        assert_eq!(
            tripped(
                true,
                &state(ArmMode::Away, false, false),
                Origin::InternalTimer,
                &PanelPolicy::default()
            ),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );
    }

    #[test]
    fn alarming_rejects_external_origins() {
        let s = state(ArmMode::Away, true, false);
        assert_eq!(
            alarming(true, &s, Origin::ManualOrSensor),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );
        assert_eq!(
            alarming(true, &s, Origin::ExternalSync),
            Verdict::Refuse(Refusal::InvalidOrigin)
        );
        assert_eq!(alarming(true, &s, Origin::InternalTimer), Verdict::Accept);
    }

    #[test]
    fn alarm_expiry_is_stale_without_trip() {
        let cleared = state(ArmMode::Away, false, false);
        assert_eq!(
            alarming(true, &cleared, Origin::InternalTimer),
            Verdict::Stale
        );
        assert_eq!(
            alarming(true, &cleared, Origin::InternalLogic),
            Verdict::Refuse(Refusal::WrongState)
        );

        let disarmed = state(ArmMode::Disarmed, true, false);
        assert_eq!(
            alarming(true, &disarmed, Origin::InternalTimer),
            Verdict::Stale
        );

        let already = state(ArmMode::Away, true, true);
        assert_eq!(
            alarming(true, &already, Origin::InternalTimer),
            Verdict::Stale
        );
    }

    #[test]
    fn internal_logic_may_silence_alarm() {
        let s = state(ArmMode::Night, false, true);
        assert_eq!(alarming(false, &s, Origin::InternalLogic), Verdict::Accept);
        assert_eq!(
            alarming(false, &state(ArmMode::Night, false, false), Origin::InternalLogic),
            Verdict::NoOp
        );
    }
}
