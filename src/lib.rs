//! Alarm panel: a home security-system state machine.
//!
//! The panel follows a "pure core, imperative shell" layout. The acceptance
//! rules in [`core`] are pure functions over the canonical state; the
//! [`machine`] shell applies them under one lock, runs the arm and alarm
//! delay timers, records history and publishes every confirmed change.
//!
//! # Modules
//!
//! - **core**: state model, origins, acceptance rules, history
//! - **timer**: cancellable per-kind delay timers
//! - **machine**: the [`AlarmPanel`] handle
//! - **notify**: change notifications and observers
//! - **accessory**: HomeKit-style characteristic binding
//! - **cue**: periodic audio cue webhooks
//! - **http**: web control panel and JSON API
//! - **config**: TOML configuration
//!
//! # Example
//!
//! ```rust
//! use alarm_panel::{AlarmPanel, CurrentState, Origin, PanelSettings, TargetMode};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let panel = AlarmPanel::new(PanelSettings {
//!     arm_delay: Duration::from_millis(10),
//!     ..PanelSettings::default()
//! })
//! .unwrap();
//!
//! panel.request_arm_mode(TargetMode::Away, Origin::ManualOrSensor).unwrap();
//! assert!(panel.state().arming);
//!
//! tokio::time::sleep(Duration::from_millis(50)).await;
//! assert_eq!(panel.state().current, CurrentState::AwayArmed);
//! # }
//! ```

pub mod accessory;
pub mod config;
pub mod core;
pub mod cue;
pub mod http;
pub mod machine;
pub mod notify;
pub mod timer;

// Re-export commonly used types
pub use core::{ArmMode, CurrentState, Origin, PanelState, SecurityState, Snapshot, TargetMode};
pub use machine::{AlarmPanel, Outcome, PanelSettings, Rejection};
pub use notify::{StateChange, StateObserver};
