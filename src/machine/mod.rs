//! Security state machine: the imperative shell around [`crate::core`].
//!
//! [`AlarmPanel`] owns the canonical state, the two delay timer slots and
//! the transition history. Each request is decided by the pure rules in
//! [`crate::core::rules`], applied under the panel lock, and published to
//! observers once the lock is released. Expired timers re-enter through the
//! same path tagged [`Origin::InternalTimer`](crate::core::Origin).

mod error;
mod panel;

pub use error::{Outcome, PanelError, Rejection, RequestResult};
pub use panel::{AlarmPanel, PanelSettings};
