//! Provenance tags carried by every state-change request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a state-change request came from.
///
/// Acceptance rules are written in terms of `(requested value, current state,
/// origin)`. Anything the panel pushes back into itself (a timer firing, a
/// reassertion after a rejection, the cascade of a disarm) carries one of the
/// internal tags, never [`Origin::ManualOrSensor`], so it cannot be rejected
/// again or start a republish loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A human or device actuation: a physical switch, a HomeKit toggle.
    ManualOrSensor,
    /// The state-sync endpoint used by the remote control-panel UI.
    ExternalSync,
    /// A delay timer firing.
    InternalTimer,
    /// The panel reasserting or cascading a consequence of another transition.
    InternalLogic,
}

impl Origin {
    pub fn is_internal(self) -> bool {
        matches!(self, Self::InternalTimer | Self::InternalLogic)
    }

    pub fn is_external(self) -> bool {
        !self.is_internal()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ManualOrSensor => "manual_or_sensor",
            Self::ExternalSync => "external_sync",
            Self::InternalTimer => "internal_timer",
            Self::InternalLogic => "internal_logic",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
