// ABOUTME: Plain-text rendering of the session state for the console.
// ABOUTME: The incremental Renderer prints only what changed since the last frame.

use chrono::DateTime;
use parley_core::{ChatEntry, ConnectionStatus, EntryKind, SessionState};

pub const TYPING_LINE: &str = "🤖 LLM is typing...";

/// `HH:MM:SS` for an ISO-8601 timestamp; the raw string if it does not parse
pub fn format_time(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt.format("%H:%M:%S").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

fn kind_marker(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::User => " ",
        EntryKind::Llm => "»",
        EntryKind::System => "*",
        EntryKind::Error => "!",
    }
}

pub fn render_entry(entry: &ChatEntry) -> String {
    format!(
        "[{}] {} {}: {}",
        format_time(&entry.timestamp),
        kind_marker(entry.kind),
        entry.username,
        entry.content
    )
}

pub fn render_status(state: &SessionState) -> String {
    match (state.status, state.username.as_deref()) {
        (ConnectionStatus::Connected, Some(name)) => {
            let id = state
                .identity
                .as_ref()
                .map(|i| i.id.as_str())
                .unwrap_or("N/A");
            format!(
                "✅ Connected as: {} (id {}) · model {}",
                name, id, state.selected_model
            )
        }
        (ConnectionStatus::Connected, None) => {
            format!("✅ Connected · model {}", state.selected_model)
        }
        (ConnectionStatus::Disconnected, _) => {
            format!("⛔ Disconnected · model {}", state.selected_model)
        }
    }
}

pub fn render_roster(state: &SessionState) -> String {
    if state.roster.is_empty() {
        return "No users online".to_string();
    }
    let names: Vec<&str> = state.roster.iter().map(|u| u.username.as_str()).collect();
    format!("👥 Online ({}): {}", names.len(), names.join(", "))
}

/// Tracks what was already printed so each refresh only adds new lines
#[derive(Debug, Default)]
pub struct Renderer {
    printed: Vec<String>,
    status: Option<String>,
    roster: Option<String>,
    typing: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for the current state
    pub fn update(&mut self, state: &SessionState) -> Vec<String> {
        let mut lines = Vec::new();

        let status = render_status(state);
        if self.status.as_ref() != Some(&status) {
            lines.push(status.clone());
            self.status = Some(status);
        }

        let roster = render_roster(state);
        if state.is_connected() && self.roster.as_ref() != Some(&roster) {
            lines.push(roster.clone());
            self.roster = Some(roster);
        } else if !state.is_connected() {
            self.roster = None;
        }

        let continues = self.printed.len() <= state.messages.len()
            && self
                .printed
                .iter()
                .zip(&state.messages)
                .all(|(id, entry)| *id == entry.id);
        let start = if continues {
            self.printed.len()
        } else {
            // The log was replaced (history or reset)
            self.printed.clear();
            if !state.messages.is_empty() {
                lines.push("── chat history ──".to_string());
            }
            0
        };
        for entry in &state.messages[start..] {
            lines.push(render_entry(entry));
            self.printed.push(entry.id.clone());
        }

        if state.assistant_typing && !self.typing {
            lines.push(TYPING_LINE.to_string());
        }
        self.typing = state.assistant_typing;

        lines
    }

    /// Forget everything so the next update prints a full frame
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
