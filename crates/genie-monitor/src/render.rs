//! Text status panel.

use std::fmt::Write as _;

use genie_core::events::EventKind;
use genie_core::text::preview;
use genie_tracker::{CoordinationSnapshot, SlaveRecord, SlaveStatus, TerminalSnapshot};
use serde_json::Value;

/// Renders coordination snapshots as plain text.
#[derive(Clone, Debug)]
pub struct StatusPanel {
    /// Maximum characters of a message or result shown per delegate line.
    pub preview_chars: usize,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self { preview_chars: 60 }
    }
}

impl StatusPanel {
    /// Panel for a snapshot: a header line, then one line per delegate.
    pub fn render(&self, snapshot: &CoordinationSnapshot) -> String {
        let state = &snapshot.state;
        let Some(id) = &state.active_coordination_id else {
            return "◆ Genie idle".to_string();
        };

        let phase = if !snapshot.is_active {
            "idle"
        } else if state.synthesis_started {
            "synthesizing"
        } else {
            "running"
        };
        let counts = state.status_counts();
        let finished: usize = counts
            .iter()
            .filter(|(status, _)| status.is_finished())
            .map(|(_, n)| n)
            .sum();
        let failed = counts
            .iter()
            .find(|(status, _)| *status == SlaveStatus::Error)
            .map_or(0, |(_, n)| *n);

        let mut out = format!(
            "◆ Genie {id} · {phase} · {} · {finished}/{} delegates done",
            format_duration(snapshot.elapsed_ms),
            state.slave_progress.len()
        );
        if failed > 0 {
            let _ = write!(out, " ({failed} failed)");
        }
        if let Some(decision) = &state.routing_decision {
            let _ = write!(out, "\n  routing: {}", preview(decision, self.preview_chars));
        }
        for tag in state.ordered_tags() {
            if let Some(record) = state.slave_progress.get(tag) {
                out.push('\n');
                out.push_str(&self.delegate_line(tag.as_str(), record));
            }
        }
        if state.synthesis_started {
            let consulted: Vec<&str> = state.profiles_consulted.iter().map(|t| t.as_str()).collect();
            let _ = write!(out, "\n  synthesis: {}", consulted.join(", "));
        }
        out
    }

    /// Panel for a finished coordination. The final state is drawn as it
    /// was while still active, followed by the outcome.
    pub fn render_terminal(&self, terminal: &TerminalSnapshot) -> String {
        let telemetry = &terminal.telemetry;
        let outcome = if telemetry.success { "ok" } else { "failed" };
        let used: Vec<&str> = telemetry.profiles_used.iter().map(|t| t.as_str()).collect();

        let mut out = self.render(&terminal.final_state);
        let _ = write!(
            out,
            "\n  done: {outcome} in {} (profiles: {})",
            format_duration(telemetry.total_duration_ms),
            if used.is_empty() { "none".to_string() } else { used.join(", ") }
        );
        if let Some(error) = &telemetry.error {
            let _ = write!(out, "\n  error: {}", preview(error, self.preview_chars));
        }
        out
    }

    /// One line for a display-only event.
    pub fn render_inert(&self, kind: EventKind, payload: &Value) -> String {
        let detail = ["text", "content", "message"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(|text| format!(" {}", preview(text, self.preview_chars)))
            .unwrap_or_default();
        format!("  · {kind}{detail}")
    }

    fn delegate_line(&self, tag: &str, record: &SlaveRecord) -> String {
        let mut line = format!(
            "  {} {tag:<6} {:<16} {:<9}",
            status_icon(record.status),
            preview(&record.name, 16),
            record.status.as_str()
        );
        match record.status {
            SlaveStatus::Pending => {}
            SlaveStatus::Active => {
                if let Some(pct) = record.progress_pct {
                    let _ = write!(line, " {pct:.0}%");
                }
                if let Some(message) = &record.message {
                    let _ = write!(line, " {}", preview(message, self.preview_chars));
                }
            }
            SlaveStatus::Completed => {
                if let Some(ms) = record.duration_ms {
                    let _ = write!(line, " {}", format_duration(ms));
                }
                if let Some(result) = &record.result {
                    let _ = write!(line, " {}", preview(result, self.preview_chars));
                }
            }
            SlaveStatus::Error => {
                if let Some(error) = &record.error {
                    let _ = write!(line, " {}", preview(error, self.preview_chars));
                }
            }
        }
        line.trim_end().to_string()
    }
}

fn status_icon(status: SlaveStatus) -> char {
    match status {
        SlaveStatus::Pending => '○',
        SlaveStatus::Active => '●',
        SlaveStatus::Completed => '✓',
        SlaveStatus::Error => '✗',
    }
}

/// `850ms`, `1.2s`.
fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let secs = ms as f64 / 1000.0;
        format!("{secs:.1}s")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
