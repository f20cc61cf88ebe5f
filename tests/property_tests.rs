//! Property-based tests for the alarm panel.
//!
//! Random sequences of requests from every origin, interleaved with waits
//! under paused Tokio time, must never break the panel's invariants.

use alarm_panel::core::{Origin, SecurityState, TargetMode};
use alarm_panel::machine::{AlarmPanel, PanelSettings, RequestResult};
use alarm_panel::notify::StateChange;
use alarm_panel::timer::TimerKind;
use alarm_panel::Snapshot;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
enum Op {
    Arm(TargetMode, Origin),
    Trip(bool, Origin),
    Alarm(bool, Origin),
    Wait(u64),
}

fn target() -> impl Strategy<Value = TargetMode> {
    prop_oneof![
        Just(TargetMode::Disarm),
        Just(TargetMode::Away),
        Just(TargetMode::Home),
        Just(TargetMode::Night),
    ]
}

fn origin() -> impl Strategy<Value = Origin> {
    prop_oneof![
        Just(Origin::ManualOrSensor),
        Just(Origin::ExternalSync),
        Just(Origin::InternalTimer),
        Just(Origin::InternalLogic),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (target(), origin()).prop_map(|(t, o)| Op::Arm(t, o)),
        3 => (any::<bool>(), origin()).prop_map(|(v, o)| Op::Trip(v, o)),
        1 => (any::<bool>(), origin()).prop_map(|(v, o)| Op::Alarm(v, o)),
        2 => (1u64..15).prop_map(Op::Wait),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn settings() -> PanelSettings {
    PanelSettings {
        arm_delay: Duration::from_secs(5),
        alarm_delay: Duration::from_secs(5),
        history_capacity: 8,
        ..PanelSettings::default()
    }
}

async fn run(panel: &AlarmPanel, op: &Op) -> Option<RequestResult> {
    match *op {
        Op::Arm(target, origin) => Some(panel.request_arm_mode(target, origin)),
        Op::Trip(value, origin) => Some(panel.request_tripped(value, origin)),
        Op::Alarm(value, origin) => Some(panel.request_alarming(value, origin)),
        Op::Wait(secs) => {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            None
        }
    }
}

fn check_invariants(panel: &AlarmPanel, state: &Snapshot) -> Result<(), TestCaseError> {
    prop_assert!(!state.alarming || state.mode.is_armed(), "alarming while disarmed: {state:?}");
    prop_assert!(!state.tripped || state.mode.is_armed(), "tripped while disarmed: {state:?}");
    prop_assert!(!state.arming || state.target == TargetMode::Away, "arming toward {state:?}");
    prop_assert_eq!(state.arming, panel.pending_timer(TimerKind::ArmDelay).is_some());
    if panel.pending_timer(TimerKind::AlarmDelay).is_some() {
        prop_assert!(state.tripped, "alarm delay pending without a trip: {state:?}");
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_for_any_request_sequence(ops in prop::collection::vec(op(), 1..40)) {
        runtime().block_on(async {
            let panel = AlarmPanel::new(settings()).unwrap();
            // An alarm can only follow a trip observed while armed.
            let mut saw_armed_trip = false;
            for op in &ops {
                let before = panel.state();
                let result = run(&panel, op).await;
                let after = panel.state();
                check_invariants(&panel, &after)?;
                if let Some(Err(rejection)) = result {
                    prop_assert_eq!(before, after, "{} changed state", rejection);
                }

                if after.tripped && after.mode.is_armed() {
                    saw_armed_trip = true;
                }
                prop_assert!(
                    !after.alarming || saw_armed_trip,
                    "alarming without a preceding armed trip after {:?}: {:?}",
                    op,
                    after
                );
                if !after.tripped && !after.alarming {
                    saw_armed_trip = false;
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn manual_disarm_always_clears(ops in prop::collection::vec(op(), 0..30)) {
        runtime().block_on(async {
            let panel = AlarmPanel::new(settings()).unwrap();
            for op in &ops {
                run(&panel, op).await;
            }

            prop_assert!(panel
                .request_arm_mode(TargetMode::Disarm, Origin::ManualOrSensor)
                .is_ok());
            prop_assert_eq!(panel.state(), SecurityState::new().snapshot());
            prop_assert!(panel.pending_timer(TimerKind::ArmDelay).is_none());
            prop_assert!(panel.pending_timer(TimerKind::AlarmDelay).is_none());

            // nothing scheduled earlier may fire afterwards
            tokio::time::sleep(Duration::from_secs(60)).await;
            prop_assert_eq!(panel.state(), SecurityState::new().snapshot());
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn observers_see_strictly_increasing_sequences(ops in prop::collection::vec(op(), 1..40)) {
        runtime().block_on(async {
            let panel = AlarmPanel::new(settings()).unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            panel.subscribe(Arc::new(move |change: &StateChange| {
                sink.lock().unwrap().push((change.sequence, change.state));
            }));

            for op in &ops {
                run(&panel, op).await;
            }
            tokio::time::sleep(Duration::from_secs(20)).await;

            let seen = seen.lock().unwrap();
            for pair in seen.windows(2) {
                prop_assert!(pair[0].0 < pair[1].0);
            }
            if let Some((_, last)) = seen.last() {
                prop_assert_eq!(*last, panel.state());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn history_is_bounded_and_contiguous(ops in prop::collection::vec(op(), 1..60)) {
        runtime().block_on(async {
            let panel = AlarmPanel::new(settings()).unwrap();
            for op in &ops {
                run(&panel, op).await;
            }

            let history = panel.history();
            prop_assert!(history.len() <= history.capacity());
            let records: Vec<_> = history.transitions().collect();
            for pair in records.windows(2) {
                prop_assert!(pair[0].sequence < pair[1].sequence);
                prop_assert_eq!(pair[0].to, pair[1].from);
            }
            if let Some(last) = history.last() {
                prop_assert_eq!(last.to, panel.panel_state());
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
