//! # genie-monitor
//!
//! Console binary that follows Genie coordinations live over the
//! notification stream, or replays a finished session's history, and draws
//! a plain-text status panel.

#![deny(unsafe_code)]

mod effects;
mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::{Stream, StreamExt};
use genie_client::ApiClient;
use genie_core::events::Notification;
use genie_core::ids::SessionId;
use genie_core::sessions::SessionDirectory;
use genie_settings::GenieSettings;
use genie_tracker::{CoordinationTracker, DispatchOutcome, TrackerConfig};
use tracing::{info, warn};

use crate::effects::ConsoleEffects;
use crate::render::StatusPanel;

/// Genie coordination monitor.
#[derive(Parser, Debug)]
#[command(name = "genie-monitor", about = "Follow Genie coordinations")]
struct Cli {
    /// Settings file (defaults to `~/.genie/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Backend base URL (overrides settings).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log filter directive (overrides settings).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the live notification stream.
    Watch {
        /// Only track coordinations of this session.
        #[arg(long)]
        session: Option<String>,
    },
    /// Rebuild the last coordination of a session from its history.
    Replay {
        /// Session whose history is replayed.
        #[arg(long)]
        session: String,
    },
}

fn load_settings(cli: &Cli) -> Result<GenieSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(genie_settings::settings_path);
    let mut settings = genie_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(url) = &cli.base_url {
        settings.server.base_url.clone_from(url);
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// Route one notification and print whatever changed.
fn process<W: Write>(
    tracker: &mut CoordinationTracker,
    panel: &StatusPanel,
    notification: &Notification,
    out: &mut W,
) -> std::io::Result<()> {
    match tracker.handle_notification(notification) {
        DispatchOutcome::Terminal(terminal) => {
            writeln!(out, "{}", panel.render_terminal(&terminal))?;
            let _ = tracker.acknowledge(&terminal.coordination_id);
        }
        DispatchOutcome::Applied(_) => {
            writeln!(out, "{}", panel.render(&tracker.snapshot()))?;
        }
        DispatchOutcome::Inert(kind) => {
            writeln!(out, "{}", panel.render_inert(kind, &notification.payload))?;
        }
        DispatchOutcome::Ignored(..) | DispatchOutcome::Unknown(_) => {}
    }
    Ok(())
}

/// Process notifications until the stream ends or `shutdown` resolves.
/// Returns `true` when stopped by `shutdown`.
async fn follow<S, F, W>(
    tracker: &mut CoordinationTracker,
    panel: &StatusPanel,
    stream: &mut S,
    shutdown: F,
    out: &mut W,
) -> std::io::Result<bool>
where
    S: Stream<Item = Notification> + Unpin,
    F: Future<Output = ()>,
    W: Write,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            next = stream.next() => {
                let Some(notification) = next else {
                    warn!("notification stream closed by server");
                    return Ok(false);
                };
                process(tracker, panel, &notification, out)?;
            }
            () = &mut shutdown => {
                info!("interrupted, shutting down");
                return Ok(true);
            }
        }
    }
}

async fn watch(
    client: &ApiClient,
    tracker: &mut CoordinationTracker,
    panel: &StatusPanel,
    session: Option<SessionId>,
) -> Result<()> {
    tracker.set_current_session(session.clone());
    let mut stdout = std::io::stdout();

    if let Some(id) = &session {
        let history = client
            .session_history(id)
            .await
            .with_context(|| format!("Failed to fetch history of session {id}"))?;
        if let Some(terminal) = tracker.replay(history) {
            let _ = tracker.acknowledge(&terminal.coordination_id);
        }
        if tracker.is_active() {
            writeln!(stdout, "{}", panel.render(&tracker.snapshot()))?;
        }
    }

    let mut stream = client
        .subscribe(session.as_ref())
        .await
        .context("Failed to open notification stream")?;
    info!(session_id = ?session.as_ref().map(SessionId::as_str), "watching notifications");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    follow(tracker, panel, &mut stream, shutdown, &mut stdout).await?;

    for handle in tracker.drain_lookups() {
        handle.abort();
    }
    Ok(())
}

async fn replay(
    client: &ApiClient,
    tracker: &mut CoordinationTracker,
    panel: &StatusPanel,
    session: SessionId,
) -> Result<()> {
    let history = client
        .session_history(&session)
        .await
        .with_context(|| format!("Failed to fetch history of session {session}"))?;
    tracker.set_current_session(Some(session));

    let mut stdout = std::io::stdout();
    if let Some(terminal) = tracker.replay(history) {
        writeln!(stdout, "{}", panel.render_terminal(&terminal))?;
        let _ = tracker.acknowledge(&terminal.coordination_id);
    } else if tracker.is_active() {
        writeln!(stdout, "{}", panel.render(&tracker.snapshot()))?;
    } else {
        writeln!(stdout, "no coordination in session history")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    if settings.logging.json {
        genie_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        genie_core::logging::init_subscriber(&settings.logging.level);
    }

    let client = Arc::new(
        ApiClient::new(settings.server.clone()).context("Failed to build API client")?,
    );
    let directory: Arc<dyn SessionDirectory> = client.clone();
    let effects = Arc::new(ConsoleEffects::default());
    let mut tracker = CoordinationTracker::new(
        TrackerConfig::from(&settings.tracker),
        effects.clone(),
        Some(directory),
    );
    let panel = StatusPanel::default();

    match cli.command {
        Command::Watch { session } => {
            let session = session.map(SessionId::from_raw);
            watch(&client, &mut tracker, &panel, session).await?;
            let companions = effects.companions();
            if !companions.is_empty() {
                let names: Vec<&str> = companions.iter().map(|s| s.display_name()).collect();
                info!(count = companions.len(), sessions = %names.join(", "), "delegate sessions seen");
            }
            if let Some(telemetry) = effects.last_telemetry() {
                info!(
                    coordination_id = %telemetry.coordination_id,
                    success = telemetry.success,
                    total_duration_ms = telemetry.total_duration_ms,
                    kept_expanded = effects.is_kept_expanded(&telemetry.coordination_id),
                    "last coordination"
                );
            }
        }
        Command::Replay { session } => {
            replay(&client, &mut tracker, &panel, SessionId::from_raw(session)).await?;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
