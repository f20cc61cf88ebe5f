//! Periodic audio cues.
//!
//! Each configured cue runs its own loop: every `interval` it reads the
//! panel snapshot and, when its condition holds, fires the notifier. A failed
//! notification is logged and the loop carries on.

use crate::core::Snapshot;
use crate::machine::AlarmPanel;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Which panel flag a cue follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueCondition {
    Arming,
    Tripped,
    Alarming,
}

impl CueCondition {
    pub fn holds(self, state: &Snapshot) -> bool {
        match self {
            CueCondition::Arming => state.arming,
            CueCondition::Tripped => state.tripped,
            CueCondition::Alarming => state.alarming,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CueCondition::Arming => "arming",
            CueCondition::Tripped => "tripped",
            CueCondition::Alarming => "alarming",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioCue {
    pub condition: CueCondition,
    pub url: String,
    pub interval: Duration,
}

#[derive(Debug, Error)]
pub enum CueError {
    #[error("failed to build webhook client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("webhook request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("webhook {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Delivers a cue somewhere audible.
pub trait CueNotifier: Send + Sync + 'static {
    fn notify(&self, cue: &AudioCue) -> impl Future<Output = Result<(), CueError>> + Send;
}

/// Fires a plain GET at the cue URL, e.g. a Sonos HTTP API clip endpoint.
#[derive(Clone, Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, CueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CueError::Client)?;
        Ok(Self { client })
    }
}

impl CueNotifier for WebhookNotifier {
    fn notify(&self, cue: &AudioCue) -> impl Future<Output = Result<(), CueError>> + Send {
        let request = self.client.get(&cue.url);
        let url = cue.url.clone();
        async move {
            let response = request.send().await.map_err(|source| CueError::Request {
                url: url.clone(),
                source,
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(CueError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            Ok(())
        }
    }
}

/// Start the loop for one cue on the current runtime.
///
/// The loop runs until the returned handle is aborted or the runtime shuts
/// down.
pub fn spawn<N: CueNotifier>(panel: AlarmPanel, cue: AudioCue, notifier: Arc<N>) -> JoinHandle<()> {
    tokio::spawn(run(panel, cue, notifier))
}

async fn run<N: CueNotifier>(panel: AlarmPanel, cue: AudioCue, notifier: Arc<N>) {
    debug!(cue = cue.condition.name(), url = %cue.url, interval = ?cue.interval, "audio cue started");
    loop {
        tokio::time::sleep(cue.interval).await;
        if !cue.condition.holds(&panel.state()) {
            continue;
        }
        match notifier.notify(&cue).await {
            Ok(()) => debug!(cue = cue.condition.name(), "audio cue sent"),
            Err(e) => warn!(cue = cue.condition.name(), error = %e, "audio cue failed"),
        }
    }
}
