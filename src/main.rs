//! alarm-panel - security-system daemon.
//!
//! Loads the configuration, builds the panel, attaches the accessory and the
//! tracing observer, starts the audio cue loops and serves the web control
//! panel until interrupted.

use alarm_panel::accessory::AlarmAccessory;
use alarm_panel::config::PanelConfig;
use alarm_panel::cue::{self, WebhookNotifier};
use alarm_panel::http::{self, AppState};
use alarm_panel::machine::AlarmPanel;
use alarm_panel::notify::TracingObserver;
use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "alarm-panel")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override web_ui_port from the configuration
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match &args.config {
        Some(path) => PanelConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => {
            info!("no configuration file given, using defaults");
            PanelConfig::default()
        }
    };

    let panel = AlarmPanel::new(config.panel_settings()).context("failed to create alarm panel")?;
    panel.subscribe(Arc::new(TracingObserver));

    let accessory = AlarmAccessory::attach(panel.clone(), config.accessory_info());
    let mut updates = accessory.updates();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => debug!(
                    characteristic = ?update.characteristic,
                    value = ?update.value,
                    sequence = update.sequence,
                    "characteristic update"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "characteristic updates lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cues = config.audio_cues();
    if !cues.is_empty() {
        let notifier = Arc::new(
            WebhookNotifier::new(config.webhook_timeout())
                .context("failed to create webhook client")?,
        );
        for audio_cue in cues {
            info!(cue = audio_cue.condition.name(), url = %audio_cue.url, "audio cue enabled");
            cue::spawn(panel.clone(), audio_cue, notifier.clone());
        }
    }

    let port = args.port.unwrap_or(config.web_ui_port);
    let addr = SocketAddr::new(config.web_ui_address, port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web UI on {addr}"))?;
    let state = AppState {
        panel,
        accessory,
        web_ui: config.web_ui_config(),
    };

    match config.tls_paths() {
        Some((cert, key)) => {
            let acceptor = http::load_acceptor(cert, key)
                .context("failed to load HTTPS certificate and key")?;
            info!(
                name = %state.accessory.info().name,
                %addr,
                "alarm panel web UI listening (https)"
            );
            http::serve_tls(listener, acceptor, state, shutdown_signal())
                .await
                .context("web UI server failed")?;
        }
        None => {
            info!(
                name = %state.accessory.info().name,
                %addr,
                "alarm panel web UI listening"
            );
            http::serve(listener, state, shutdown_signal())
                .await
                .context("web UI server failed")?;
        }
    }

    info!("alarm panel stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received interrupt, shutting down"),
        Err(e) => warn!(error = %e, "failed to listen for interrupt, shutting down"),
    }
}
