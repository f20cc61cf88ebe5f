//! HomeKit-style security-system accessory.
//!
//! Exposes the panel as four characteristics: the security system target
//! and current state (numeric codes as HomeKit defines them), a tripped
//! switch, and a read-only contact sensor that is open while arming. Writes
//! become panel requests tagged [`Origin::ManualOrSensor`]. Confirmed changes
//! come back through [`StateObserver`] and are broadcast as
//! [`CharacteristicUpdate`]s for whatever bridge is listening.

use crate::core::{CurrentState, Origin, Snapshot, TargetMode};
use crate::machine::{AlarmPanel, Outcome, Rejection};
use crate::notify::{StateChange, StateObserver};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub const TARGET_STAY_ARM: u8 = 0;
pub const TARGET_AWAY_ARM: u8 = 1;
pub const TARGET_NIGHT_ARM: u8 = 2;
pub const TARGET_DISARM: u8 = 3;

pub const CURRENT_STAY_ARM: u8 = 0;
pub const CURRENT_AWAY_ARM: u8 = 1;
pub const CURRENT_NIGHT_ARM: u8 = 2;
pub const CURRENT_DISARMED: u8 = 3;
pub const CURRENT_ALARM_TRIGGERED: u8 = 4;

pub const CONTACT_DETECTED: u8 = 0;
pub const CONTACT_NOT_DETECTED: u8 = 1;

const UPDATE_BUFFER: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    SecuritySystemTargetState,
    SecuritySystemCurrentState,
    TrippedOn,
    ArmingContactSensorState,
}

impl Characteristic {
    pub const ALL: [Characteristic; 4] = [
        Characteristic::SecuritySystemTargetState,
        Characteristic::SecuritySystemCurrentState,
        Characteristic::TrippedOn,
        Characteristic::ArmingContactSensorState,
    ];

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Characteristic::SecuritySystemTargetState | Characteristic::TrippedOn
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Code(u8),
    Bool(bool),
}

/// A value the bridge should push to controllers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CharacteristicUpdate {
    pub characteristic: Characteristic,
    pub value: CharacteristicValue,
    /// Sequence of the panel change this came from
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

impl Default for AccessoryInfo {
    fn default() -> Self {
        Self {
            name: "Alarm Panel".to_string(),
            manufacturer: "alarm-panel".to_string(),
            model: "Security System".to_string(),
            serial_number: "0001".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AccessoryError {
    #[error("characteristic {0:?} is read-only")]
    ReadOnly(Characteristic),

    #[error("invalid value {value:?} for {characteristic:?}")]
    InvalidValue {
        characteristic: Characteristic,
        value: CharacteristicValue,
    },

    #[error(transparent)]
    Rejected(#[from] Rejection),
}

pub fn target_code(target: TargetMode) -> u8 {
    match target {
        TargetMode::Home => TARGET_STAY_ARM,
        TargetMode::Away => TARGET_AWAY_ARM,
        TargetMode::Night => TARGET_NIGHT_ARM,
        TargetMode::Disarm => TARGET_DISARM,
    }
}

pub fn target_from_code(code: u8) -> Option<TargetMode> {
    match code {
        TARGET_STAY_ARM => Some(TargetMode::Home),
        TARGET_AWAY_ARM => Some(TargetMode::Away),
        TARGET_NIGHT_ARM => Some(TargetMode::Night),
        TARGET_DISARM => Some(TargetMode::Disarm),
        _ => None,
    }
}

pub fn current_code(current: CurrentState) -> u8 {
    match current {
        CurrentState::HomeArmed => CURRENT_STAY_ARM,
        CurrentState::AwayArmed => CURRENT_AWAY_ARM,
        CurrentState::NightArmed => CURRENT_NIGHT_ARM,
        CurrentState::Disarmed => CURRENT_DISARMED,
        CurrentState::AlarmTriggered => CURRENT_ALARM_TRIGGERED,
    }
}

fn value_of(characteristic: Characteristic, state: &Snapshot) -> CharacteristicValue {
    match characteristic {
        Characteristic::SecuritySystemTargetState => {
            CharacteristicValue::Code(target_code(state.target))
        }
        Characteristic::SecuritySystemCurrentState => {
            CharacteristicValue::Code(current_code(state.current))
        }
        Characteristic::TrippedOn => CharacteristicValue::Bool(state.tripped),
        Characteristic::ArmingContactSensorState => CharacteristicValue::Code(if state.arming {
            CONTACT_NOT_DETECTED
        } else {
            CONTACT_DETECTED
        }),
    }
}

struct Cache {
    state: Snapshot,
    sequence: u64,
}

/// The accessory view of one panel.
pub struct AlarmAccessory {
    panel: AlarmPanel,
    info: AccessoryInfo,
    cache: Mutex<Cache>,
    updates: broadcast::Sender<CharacteristicUpdate>,
}

impl AlarmAccessory {
    /// Create the accessory and subscribe it to `panel`.
    pub fn attach(panel: AlarmPanel, info: AccessoryInfo) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        let accessory = Arc::new(Self {
            cache: Mutex::new(Cache {
                state: panel.state(),
                sequence: 0,
            }),
            panel,
            info,
            updates,
        });
        // Weak, so the panel's observer list does not keep the accessory alive.
        let weak = Arc::downgrade(&accessory);
        accessory.panel.subscribe(Arc::new(move |change: &StateChange| {
            if let Some(accessory) = weak.upgrade() {
                accessory.state_changed(change);
            }
        }));
        accessory
    }

    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Last confirmed value; never a pending or rejected write.
    pub fn get(&self, characteristic: Characteristic) -> CharacteristicValue {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        value_of(characteristic, &cache.state)
    }

    pub fn values(&self) -> Vec<(Characteristic, CharacteristicValue)> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Characteristic::ALL
            .into_iter()
            .map(|c| (c, value_of(c, &cache.state)))
            .collect()
    }

    /// Write a characteristic as a controller would.
    pub fn set(
        &self,
        characteristic: Characteristic,
        value: CharacteristicValue,
    ) -> Result<Outcome, AccessoryError> {
        let invalid = || AccessoryError::InvalidValue {
            characteristic,
            value,
        };
        match (characteristic, value) {
            (Characteristic::SecuritySystemTargetState, CharacteristicValue::Code(code)) => {
                let target = target_from_code(code).ok_or_else(invalid)?;
                self.set_target(target)
            }
            (Characteristic::TrippedOn, CharacteristicValue::Bool(tripped)) => {
                self.set_tripped(tripped)
            }
            (c, _) if !c.is_writable() => Err(AccessoryError::ReadOnly(c)),
            _ => Err(invalid()),
        }
    }

    pub fn set_target(&self, target: TargetMode) -> Result<Outcome, AccessoryError> {
        info!(accessory = %self.info.name, %target, "target state set from accessory");
        Ok(self.panel.request_arm_mode(target, Origin::ManualOrSensor)?)
    }

    pub fn set_tripped(&self, tripped: bool) -> Result<Outcome, AccessoryError> {
        info!(accessory = %self.info.name, tripped, "tripped set from accessory");
        Ok(self.panel.request_tripped(tripped, Origin::ManualOrSensor)?)
    }

    pub fn updates(&self) -> broadcast::Receiver<CharacteristicUpdate> {
        self.updates.subscribe()
    }
}

impl StateObserver for AlarmAccessory {
    fn state_changed(&self, change: &StateChange) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if change.sequence <= cache.sequence {
            debug!(
                sequence = change.sequence,
                seen = cache.sequence,
                "ignoring out-of-order change"
            );
            return;
        }

        let previous = cache.state;
        cache.state = change.state;
        cache.sequence = change.sequence;

        // A reassertion pushes everything so controllers drop optimistic values.
        for characteristic in Characteristic::ALL {
            let value = value_of(characteristic, &change.state);
            if change.is_reassertion() || value != value_of(characteristic, &previous) {
                // No receivers is fine; the cache already holds the value.
                let _ = self.updates.send(CharacteristicUpdate {
                    characteristic,
                    value,
                    sequence: change.sequence,
                });
            }
        }
    }
}
