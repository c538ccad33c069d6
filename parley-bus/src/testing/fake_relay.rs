// ABOUTME: Scripted stand-in for the chat relay, used as a MockBus responder.
// ABOUTME: Reproduces the relay's join, chat echo, and model query event sequences.

use crate::backends::mock::Responder;
use crate::event::{BusEvent, ChatEntry, EntryKind, OutboundEvent, RosterEntry, UserIdentity};
use chrono::SecondsFormat;
use std::collections::VecDeque;

/// Number of history entries sent to a joining client
pub const HISTORY_WINDOW: usize = 50;

/// Relay imitation for a single connected client.
///
/// On `join` it answers with identity, roster and history; chat messages are
/// echoed back; model queries produce the echo, the typing transitions, and
/// either the next scripted reply or an error entry.
pub struct FakeRelay {
    present: Vec<String>,
    history: Vec<ChatEntry>,
    replies: VecDeque<String>,
    joined_as: Option<String>,
    next_user: u64,
    next_message: u64,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            present: Vec::new(),
            history: Vec::new(),
            replies: VecDeque::new(),
            joined_as: None,
            next_user: 0,
            next_message: 0,
        }
    }

    /// Another user already in the chat
    pub fn with_user(mut self, username: &str) -> Self {
        self.present.push(username.to_string());
        self
    }

    /// Entries already stored by the relay before the client joins
    pub fn with_history(mut self, entries: Vec<ChatEntry>) -> Self {
        self.history.extend(entries);
        self
    }

    /// Queue the model's answer to the next query
    pub fn reply_with(mut self, text: &str) -> Self {
        self.replies.push_back(text.to_string());
        self
    }

    fn entry(&mut self, username: String, content: String, kind: EntryKind) -> ChatEntry {
        self.next_message += 1;
        let entry = ChatEntry {
            id: format!("m{}", self.next_message),
            username,
            content,
            timestamp: now(),
            kind,
        };
        self.history.push(entry.clone());
        entry
    }
}

impl Default for FakeRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Responder for FakeRelay {
    fn respond(&mut self, event: &OutboundEvent) -> Vec<BusEvent> {
        match event {
            OutboundEvent::Join { username } => {
                self.next_user += 1;
                self.joined_as = Some(username.clone());
                self.present.push(username.clone());

                let roster = self
                    .present
                    .iter()
                    .map(|name| RosterEntry {
                        username: name.clone(),
                    })
                    .collect();
                let start = self.history.len().saturating_sub(HISTORY_WINDOW);

                vec![
                    BusEvent::Identity(UserIdentity {
                        id: format!("u{}", self.next_user),
                        username: username.clone(),
                    }),
                    BusEvent::RosterUpdate(roster),
                    BusEvent::HistorySnapshot(self.history[start..].to_vec()),
                ]
            }
            OutboundEvent::ChatSend { content } => {
                let Some(username) = self.joined_as.clone() else {
                    return Vec::new();
                };
                vec![BusEvent::ChatEntry(self.entry(
                    username,
                    content.clone(),
                    EntryKind::User,
                ))]
            }
            OutboundEvent::ModelQuery { content, model } => {
                let Some(username) = self.joined_as.clone() else {
                    return Vec::new();
                };
                let question = self.entry(username, content.clone(), EntryKind::User);
                let answer = match self.replies.pop_front() {
                    Some(text) => self.entry(format!("🤖 {}", model), text, EntryKind::Llm),
                    None => self.entry(
                        "⚠️ System".to_string(),
                        format!("Error: Unable to get response from LLM. model '{}' unavailable", model),
                        EntryKind::Error,
                    ),
                };

                vec![
                    BusEvent::ChatEntry(question),
                    BusEvent::AssistantTyping(true),
                    BusEvent::AssistantTyping(false),
                    BusEvent::ChatEntry(answer),
                ]
            }
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
