//! Web control surface.
//!
//! Serves a single control page and a small JSON API over the panel.
//! Every write through the API is tagged [`Origin::ExternalSync`]: it reflects
//! a state someone else already decided, so it may set `tripped` but can never
//! clear it or raise the alarm directly.

use crate::accessory::{AlarmAccessory, Characteristic, CharacteristicValue};
use crate::config::WebUiConfig;
use crate::core::{Origin, Snapshot, TargetMode, TransitionHistory};
use crate::machine::{AlarmPanel, RequestResult};
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub mod tls;

pub use tls::{load_acceptor, serve_tls, TlsError};


const INDEX_HTML: &str = include_str!("../../html/index.html");

#[derive(Clone)]
pub struct AppState {
    pub panel: AlarmPanel,
    pub accessory: Arc<AlarmAccessory>,
    pub web_ui: WebUiConfig,
}

/// Body of `POST /api/state`. Absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    pub target_state: Option<TargetMode>,
    /// Shorthand for `targetState`: true arms away, false disarms
    pub away: Option<bool>,
    pub tripped: Option<bool>,
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/state", get(api_state).post(api_state_update))
        .route("/config", get(api_config))
        .route("/history", get(api_history))
        .route("/accessory", get(api_accessory));

    Router::new()
        .route("/", get(index))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(16 * 1024))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn api_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.panel.state())
}

async fn api_state_update(
    State(state): State<AppState>,
    Json(update): Json<StateUpdate>,
) -> Json<Snapshot> {
    debug!(?update, "state update received");
    let panel = &state.panel;

    let target = update.target_state.or(update.away.map(|away| {
        if away {
            TargetMode::Away
        } else {
            TargetMode::Disarm
        }
    }));
    if let Some(target) = target {
        log_result("targetState", panel.request_arm_mode(target, Origin::ExternalSync));
    }
    if let Some(tripped) = update.tripped {
        log_result("tripped", panel.request_tripped(tripped, Origin::ExternalSync));
    }

    Json(panel.state())
}

fn log_result(field: &str, result: RequestResult) {
    match result {
        Ok(outcome) => debug!(field, ?outcome, "web update applied"),
        Err(rejection) => info!(field, %rejection, "web update rejected"),
    }
}

async fn api_config(State(state): State<AppState>) -> Json<WebUiConfig> {
    Json(state.web_ui)
}

async fn api_history(State(state): State<AppState>) -> Json<TransitionHistory> {
    Json(state.panel.history())
}

async fn api_accessory(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, CharacteristicValue>> {
    Json(
        state
            .accessory
            .values()
            .into_iter()
            .map(|(c, v)| (characteristic_key(c).to_string(), v))
            .collect(),
    )
}

fn characteristic_key(characteristic: Characteristic) -> &'static str {
    match characteristic {
        Characteristic::SecuritySystemTargetState => "securitySystemTargetState",
        Characteristic::SecuritySystemCurrentState => "securitySystemCurrentState",
        Characteristic::TrippedOn => "trippedOn",
        Characteristic::ArmingContactSensorState => "armingContactSensorState",
    }
}
