//! Canonical security state and the read-only views derived from it.
//!
//! [`SecurityState`] is the single record the panel owns. Everything handed
//! to collaborators is a [`Snapshot`] copy, and logs and history describe the
//! panel through the derived [`PanelState`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current security posture on the arm/disarm axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArmMode {
    Disarmed,
    Away,
    Home,
    Night,
}

impl ArmMode {
    /// Whether a trip can be registered in this posture.
    pub fn is_armed(self) -> bool {
        !matches!(self, Self::Disarmed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Disarmed => "Disarmed",
            Self::Away => "Away",
            Self::Home => "Home",
            Self::Night => "Night",
        }
    }
}

/// Requested arm/disarm target.
///
/// Serialized names match the web UI's wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetMode {
    #[serde(rename = "TARGET_DISARM")]
    Disarm,
    #[serde(rename = "TARGET_AWAY_ARM")]
    Away,
    #[serde(rename = "TARGET_HOME_ARM")]
    Home,
    #[serde(rename = "TARGET_NIGHT_ARM")]
    Night,
}

impl TargetMode {
    /// The posture this target settles into once reached.
    pub fn arm_mode(self) -> ArmMode {
        match self {
            Self::Disarm => ArmMode::Disarmed,
            Self::Away => ArmMode::Away,
            Self::Home => ArmMode::Home,
            Self::Night => ArmMode::Night,
        }
    }

    /// Home and night arm immediately; away goes through the arm delay.
    pub fn is_delayed(self) -> bool {
        matches!(self, Self::Away)
    }
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disarm => "TARGET_DISARM",
            Self::Away => "TARGET_AWAY_ARM",
            Self::Home => "TARGET_HOME_ARM",
            Self::Night => "TARGET_NIGHT_ARM",
        };
        f.write_str(name)
    }
}

/// Current state as a security-system controller displays it.
///
/// An active alarm hides the armed posture behind `AlarmTriggered`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrentState {
    #[serde(rename = "CURRENT_DISARMED")]
    Disarmed,
    #[serde(rename = "CURRENT_AWAY_ARMED")]
    AwayArmed,
    #[serde(rename = "CURRENT_HOME_ARMED")]
    HomeArmed,
    #[serde(rename = "CURRENT_NIGHT_ARMED")]
    NightArmed,
    #[serde(rename = "CURRENT_ALARM_TRIGGERED")]
    AlarmTriggered,
}

/// The canonical state record, owned exclusively by the panel.
///
/// `arming` is true between an accepted away-arm request and the arm delay
/// elapsing; during that window `mode` still holds the previous posture.
///
/// # Example
///
/// ```rust
/// use alarm_panel::core::{ArmMode, SecurityState, TargetMode};
///
/// let state = SecurityState::new();
/// assert_eq!(state.mode, ArmMode::Disarmed);
/// assert_eq!(state.target, TargetMode::Disarm);
/// assert!(!state.tripped && !state.alarming && !state.arming);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    pub mode: ArmMode,
    pub target: TargetMode,
    pub tripped: bool,
    pub alarming: bool,
    pub arming: bool,
}

impl Default for SecurityState {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityState {
    /// Start-up state: disarmed, not tripped, not alarming.
    pub fn new() -> Self {
        Self {
            mode: ArmMode::Disarmed,
            target: TargetMode::Disarm,
            tripped: false,
            alarming: false,
            arming: false,
        }
    }

    pub fn current(&self) -> CurrentState {
        if self.alarming {
            return CurrentState::AlarmTriggered;
        }
        match self.mode {
            ArmMode::Disarmed => CurrentState::Disarmed,
            ArmMode::Away => CurrentState::AwayArmed,
            ArmMode::Home => CurrentState::HomeArmed,
            ArmMode::Night => CurrentState::NightArmed,
        }
    }

    pub fn panel_state(&self) -> PanelState {
        if self.alarming {
            PanelState::Alarming(self.mode)
        } else if self.tripped {
            PanelState::Tripped(self.mode)
        } else if self.arming {
            PanelState::Arming { from: self.mode }
        } else if self.mode.is_armed() {
            PanelState::Armed(self.mode)
        } else {
            PanelState::Disarmed
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode,
            target: self.target,
            current: self.current(),
            tripped: self.tripped,
            alarming: self.alarming,
            arming: self.arming,
        }
    }
}

/// Read-only copy of the panel state handed to collaborators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub mode: ArmMode,
    #[serde(rename = "targetState")]
    pub target: TargetMode,
    #[serde(rename = "currentState")]
    pub current: CurrentState,
    pub tripped: bool,
    pub alarming: bool,
    pub arming: bool,
}

/// Derived state-machine view of the panel.
///
/// Precedence is alarming, then tripped, then arming, then armed. An away
/// arm in progress reports the posture it is arming from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "mode")]
pub enum PanelState {
    Disarmed,
    Arming { from: ArmMode },
    Armed(ArmMode),
    Tripped(ArmMode),
    Alarming(ArmMode),
}

impl PanelState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disarmed => "Disarmed",
            Self::Arming { .. } => "Arming",
            Self::Armed(_) => "Armed",
            Self::Tripped(_) => "Tripped",
            Self::Alarming(_) => "Alarming",
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Alarming(_))
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disarmed => f.write_str("Disarmed"),
            Self::Arming { from } => write!(f, "Arming(from {})", from.name()),
            Self::Armed(mode) | Self::Tripped(mode) | Self::Alarming(mode) => {
                write!(f, "{}({})", self.name(), mode.name())
            }
        }
    }
}
