//! Pure core of the alarm panel.
//!
//! This module holds the data model and the acceptance rules:
//! - Canonical state and its read-only views
//! - Origin tags carried by every request
//! - Pure acceptance rules per operation
//! - Bounded transition history
//!
//! Nothing in here schedules timers, takes locks or talks to observers. The
//! [`crate::machine`] shell does that around these functions.

mod history;
mod origin;
pub mod rules;
mod state;

pub use history::{TransitionHistory, TransitionRecord, DEFAULT_HISTORY_CAPACITY};
pub use origin::Origin;
pub use rules::{ManualClearPolicy, PanelPolicy, RejectedTripPolicy, Request};
pub use state::{ArmMode, CurrentState, PanelState, SecurityState, Snapshot, TargetMode};
