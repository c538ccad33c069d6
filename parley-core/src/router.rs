// ABOUTME: Event router - applies inbound bus events to the session state.
// ABOUTME: One match arm per event kind, each touching a single field.

use crate::state::{ConnectionStatus, SessionState};
use parley_bus::{BusEvent, ChatEntry};

/// Apply one inbound event.
///
/// The match is exhaustive, so a new [`BusEvent`] variant cannot be added
/// without deciding what it mutates.
pub fn apply(state: &mut SessionState, event: BusEvent) {
    match event {
        BusEvent::Connected => {
            state.status = ConnectionStatus::Connected;
        }
        BusEvent::Disconnected { reason } => {
            tracing::info!(%reason, "Relay connection lost");
            state.status = ConnectionStatus::Disconnected;
        }
        BusEvent::Identity(identity) => {
            tracing::debug!(id = %identity.id, username = %identity.username, "Identity assigned");
            state.identity = Some(identity);
        }
        BusEvent::ChatEntry(entry) => {
            state.messages.push(entry);
        }
        BusEvent::HistorySnapshot(entries) => {
            tracing::debug!(count = entries.len(), "History snapshot received");
            state.messages = entries;
        }
        BusEvent::RosterUpdate(roster) => {
            state.roster = roster;
        }
        BusEvent::UserJoined(presence) => {
            state.messages.push(ChatEntry::system(
                format!("{} joined the chat", presence.username),
                presence.timestamp,
            ));
        }
        BusEvent::UserLeft(presence) => {
            state.messages.push(ChatEntry::system(
                format!("{} left the chat", presence.username),
                presence.timestamp,
            ));
        }
        BusEvent::AssistantTyping(typing) => {
            state.assistant_typing = typing;
        }
    }
}
