//! Panel configuration.
//!
//! Loaded from a TOML file where every key is optional. Validation uses
//! Stillwater's `Validation` so a bad file reports every invalid value in one
//! pass instead of stopping at the first.
//!
//! # Example
//!
//! ```rust
//! use alarm_panel::config::PanelConfig;
//! use std::time::Duration;
//!
//! let config = PanelConfig::from_toml_str(
//!     r#"
//!     away_arm_delay = 45
//!     manual_clear_policy = "allow_when_armed_home"
//!     arming_tone_webhook_url = "http://sonos.local:5005/clip/arming.mp3"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.panel_settings().arm_delay, Duration::from_secs(45));
//! assert_eq!(config.audio_cues().len(), 1);
//! ```

pub mod error;

pub use error::{ConfigError, ConfigViolation};

use crate::accessory::AccessoryInfo;
use crate::core::{ManualClearPolicy, PanelPolicy, RejectedTripPolicy, DEFAULT_HISTORY_CAPACITY};
use crate::cue::{AudioCue, CueCondition};
use crate::machine::PanelSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// File-level configuration. Durations are whole seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub name: String,

    pub away_arm_delay: u64,
    pub alarm_delay: u64,
    pub manual_clear_policy: ManualClearPolicy,
    pub rejected_trip_policy: RejectedTripPolicy,
    pub keep_tripped_while_alarming: bool,
    pub history_capacity: usize,

    pub web_ui_address: IpAddr,
    pub web_ui_port: u16,
    pub web_ui_poll_interval: u64,
    pub web_ui_debug: bool,
    pub web_ui_arming_tone_mp3_url: Option<String>,
    pub web_ui_tripped_tone_mp3_url: Option<String>,
    pub web_ui_alarming_tone_mp3_url: Option<String>,
    pub https_key_path: Option<PathBuf>,
    pub https_cert_path: Option<PathBuf>,

    #[serde(alias = "sonos_http_arming_tone_api_url")]
    pub arming_tone_webhook_url: Option<String>,
    #[serde(alias = "sonos_http_tripped_tone_api_url")]
    pub tripped_tone_webhook_url: Option<String>,
    #[serde(alias = "sonos_http_alarming_tone_api_url")]
    pub alarming_tone_webhook_url: Option<String>,
    pub arming_tone_interval: u64,
    pub tripped_tone_interval: u64,
    pub alarming_tone_interval: u64,
    pub webhook_timeout: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            name: "Alarm Panel".to_string(),
            away_arm_delay: 30,
            alarm_delay: 30,
            manual_clear_policy: ManualClearPolicy::default(),
            rejected_trip_policy: RejectedTripPolicy::default(),
            keep_tripped_while_alarming: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            web_ui_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            web_ui_port: 8888,
            web_ui_poll_interval: 2,
            web_ui_debug: false,
            web_ui_arming_tone_mp3_url: None,
            web_ui_tripped_tone_mp3_url: None,
            web_ui_alarming_tone_mp3_url: None,
            https_key_path: None,
            https_cert_path: None,
            arming_tone_webhook_url: None,
            tripped_tone_webhook_url: None,
            alarming_tone_webhook_url: None,
            arming_tone_interval: 3,
            tripped_tone_interval: 1,
            alarming_tone_interval: 1,
            webhook_timeout: 5,
        }
    }
}

/// What the control-panel page needs to know about itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebUiConfig {
    pub web_ui_poll_interval: u64,
    pub web_ui_debug: bool,
    pub web_ui_arming_tone_mp3_url: Option<String>,
    pub web_ui_tripped_tone_mp3_url: Option<String>,
    pub web_ui_alarming_tone_mp3_url: Option<String>,
    pub arming_tone_interval: u64,
    pub tripped_tone_interval: u64,
    pub alarming_tone_interval: u64,
}

/// Longest accepted arm or alarm delay.
pub const MAX_DELAY_SECS: u64 = 86_400;

type Checked = Validation<(), NonEmptyVec<ConfigViolation>>;

fn at_most(field: &'static str, value: u64, max: u64) -> Checked {
    if value <= max {
        Validation::success(())
    } else {
        Validation::fail(ConfigViolation::TooLarge { field, max })
    }
}

fn paired(
    (first, first_set): (&'static str, bool),
    (second, second_set): (&'static str, bool),
) -> Checked {
    match (first_set, second_set) {
        (true, false) => Validation::fail(ConfigViolation::Unpaired {
            set: first,
            missing: second,
        }),
        (false, true) => Validation::fail(ConfigViolation::Unpaired {
            set: second,
            missing: first,
        }),
        _ => Validation::success(()),
    }
}

fn positive(field: &'static str, value: u64) -> Checked {
    if value > 0 {
        Validation::success(())
    } else {
        Validation::fail(ConfigViolation::NotPositive { field })
    }
}

fn http_url(field: &'static str, value: Option<&str>) -> Checked {
    let Some(value) = value else {
        return Validation::success(());
    };
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Validation::success(()),
        _ => Validation::fail(ConfigViolation::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

impl PanelConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        match config.validate() {
            Validation::Success(_) => Ok(config),
            Validation::Failure(violations) => Err(ConfigError::Invalid(
                violations.iter().cloned().collect(),
            )),
        }
    }

    /// Check every value, accumulating all violations.
    ///
    /// Delays may be zero but not longer than [`MAX_DELAY_SECS`]; intervals,
    /// timeouts, the port and the history capacity may not be zero. The two
    /// HTTPS paths must be given together.
    pub fn validate(&self) -> Checked {
        let checks = vec![
            at_most("away_arm_delay", self.away_arm_delay, MAX_DELAY_SECS),
            at_most("alarm_delay", self.alarm_delay, MAX_DELAY_SECS),
            positive("web_ui_port", u64::from(self.web_ui_port)),
            positive("web_ui_poll_interval", self.web_ui_poll_interval),
            positive("arming_tone_interval", self.arming_tone_interval),
            positive("tripped_tone_interval", self.tripped_tone_interval),
            positive("alarming_tone_interval", self.alarming_tone_interval),
            positive("webhook_timeout", self.webhook_timeout),
            positive("history_capacity", self.history_capacity as u64),
            http_url(
                "arming_tone_webhook_url",
                self.arming_tone_webhook_url.as_deref(),
            ),
            http_url(
                "tripped_tone_webhook_url",
                self.tripped_tone_webhook_url.as_deref(),
            ),
            http_url(
                "alarming_tone_webhook_url",
                self.alarming_tone_webhook_url.as_deref(),
            ),
            paired(
                ("https_key_path", self.https_key_path.is_some()),
                ("https_cert_path", self.https_cert_path.is_some()),
            ),
        ];

        Validation::all_vec(checks).map(|_| ())
    }

    pub fn panel_settings(&self) -> PanelSettings {
        PanelSettings {
            arm_delay: Duration::from_secs(self.away_arm_delay),
            alarm_delay: Duration::from_secs(self.alarm_delay),
            policy: PanelPolicy {
                manual_clear: self.manual_clear_policy,
                rejected_trip: self.rejected_trip_policy,
                keep_tripped_while_alarming: self.keep_tripped_while_alarming,
            },
            history_capacity: self.history_capacity,
        }
    }

    pub fn web_ui_config(&self) -> WebUiConfig {
        WebUiConfig {
            web_ui_poll_interval: self.web_ui_poll_interval,
            web_ui_debug: self.web_ui_debug,
            web_ui_arming_tone_mp3_url: self.web_ui_arming_tone_mp3_url.clone(),
            web_ui_tripped_tone_mp3_url: self.web_ui_tripped_tone_mp3_url.clone(),
            web_ui_alarming_tone_mp3_url: self.web_ui_alarming_tone_mp3_url.clone(),
            arming_tone_interval: self.arming_tone_interval,
            tripped_tone_interval: self.tripped_tone_interval,
            alarming_tone_interval: self.alarming_tone_interval,
        }
    }

    /// One cue per configured webhook URL.
    pub fn audio_cues(&self) -> Vec<AudioCue> {
        [
            (
                CueCondition::Arming,
                &self.arming_tone_webhook_url,
                self.arming_tone_interval,
            ),
            (
                CueCondition::Tripped,
                &self.tripped_tone_webhook_url,
                self.tripped_tone_interval,
            ),
            (
                CueCondition::Alarming,
                &self.alarming_tone_webhook_url,
                self.alarming_tone_interval,
            ),
        ]
        .into_iter()
        .filter_map(|(condition, url, interval)| {
            url.as_ref().map(|url| AudioCue {
                condition,
                url: url.clone(),
                interval: Duration::from_secs(interval),
            })
        })
        .collect()
    }

    /// Certificate and key paths when the web UI should be served over HTTPS.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.https_cert_path, &self.https_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout)
    }

    pub fn accessory_info(&self) -> AccessoryInfo {
        AccessoryInfo {
            name: self.name.clone(),
            ..AccessoryInfo::default()
        }
    }
}
