// ABOUTME: Typed inbound and outbound events carried over the message bus.
// ABOUTME: Decodes relay payloads field by field so a missing field never drops an event.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Wire names used by the relay server.
///
/// Inbound events also accept their logical names (`identity`, `chat_entry`, ...)
/// so a relay speaking either vocabulary is understood.
pub mod wire {
    pub const IDENTITY: &str = "user_info";
    pub const CHAT_ENTRY: &str = "message";
    pub const HISTORY_SNAPSHOT: &str = "chat_history";
    pub const ROSTER_UPDATE: &str = "users_update";
    pub const USER_JOINED: &str = "user_joined";
    pub const USER_LEFT: &str = "user_left";
    pub const ASSISTANT_TYPING: &str = "llm_typing";

    pub const JOIN: &str = "join";
    pub const CHAT_SEND: &str = "message";
    pub const MODEL_QUERY: &str = "llm_message";
}

/// Display name used for locally synthesized presence entries
pub const SYSTEM_SENDER: &str = "📢 System";

// =============================================================================
// Session data carried by events
// =============================================================================

/// Kind of a chat log entry, used by the view to pick a style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    User,
    Llm,
    System,
    Error,
}

impl EntryKind {
    /// Map a wire `type` string. Anything unrecognized is shown as an error entry.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "user" => EntryKind::User,
            "llm" => EntryKind::Llm,
            "system" => EntryKind::System,
            _ => EntryKind::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::User => "user",
            EntryKind::Llm => "llm",
            EntryKind::System => "system",
            EntryKind::Error => "error",
        }
    }
}

/// One entry of the session message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Unique within a session
    pub id: String,
    pub username: String,
    pub content: String,
    /// ISO-8601 timestamp as sent by the relay
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl ChatEntry {
    /// Build a system notice with a locally synthesized id
    pub fn system(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            id: local_id("system"),
            username: SYSTEM_SENDER.to_string(),
            content: content.into(),
            timestamp: timestamp.into(),
            kind: EntryKind::System,
        }
    }

    /// Decode a relay payload, defaulting each missing field independently
    pub fn from_payload(payload: &Value) -> Self {
        let id = str_field(payload, "id").unwrap_or_else(|| local_id("msg"));
        let kind = str_field(payload, "type")
            .map(|t| EntryKind::from_wire(&t))
            .unwrap_or_default();

        Self {
            id,
            username: str_field(payload, "username").unwrap_or_else(|| "Unknown".to_string()),
            content: str_field(payload, "content").unwrap_or_default(),
            timestamp: str_field(payload, "timestamp").unwrap_or_default(),
            kind,
        }
    }
}

/// Identity assigned by the relay after the join announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
}

impl UserIdentity {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            id: str_field(payload, "id").unwrap_or_default(),
            username: str_field(payload, "username").unwrap_or_default(),
        }
    }
}

/// A user present in the chat
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterEntry {
    pub username: String,
}

/// Payload of `user_joined` / `user_left`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub username: String,
    pub timestamp: String,
}

impl Presence {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            username: str_field(payload, "username").unwrap_or_else(|| "Unknown".to_string()),
            timestamp: str_field(payload, "timestamp").unwrap_or_default(),
        }
    }
}

// =============================================================================
// Inbound events
// =============================================================================

/// Events delivered by a transport connection, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Link handshake completed
    Connected,
    /// Link ended (remote close, network error, ping timeout)
    Disconnected { reason: String },
    /// Identity assigned by the relay
    Identity(UserIdentity),
    /// A new entry for the message log
    ChatEntry(ChatEntry),
    /// Full replacement of the message log
    HistorySnapshot(Vec<ChatEntry>),
    /// Full replacement of the roster
    RosterUpdate(Vec<RosterEntry>),
    UserJoined(Presence),
    UserLeft(Presence),
    /// Whether the language model is producing a reply
    AssistantTyping(bool),
}

impl BusEvent {
    /// Decode a named relay event. Returns `None` for names this client does not know.
    pub fn decode(name: &str, payload: &Value) -> Option<Self> {
        let event = match name {
            wire::IDENTITY | "identity" => BusEvent::Identity(UserIdentity::from_payload(payload)),
            wire::CHAT_ENTRY | "chat_entry" => {
                BusEvent::ChatEntry(ChatEntry::from_payload(payload))
            }
            wire::HISTORY_SNAPSHOT | "history_snapshot" => BusEvent::HistorySnapshot(
                array_items(payload)
                    .iter()
                    .map(ChatEntry::from_payload)
                    .collect(),
            ),
            wire::ROSTER_UPDATE | "roster_update" => BusEvent::RosterUpdate(
                array_items(payload)
                    .iter()
                    .filter_map(|user| str_field(user, "username"))
                    .map(|username| RosterEntry { username })
                    .collect(),
            ),
            wire::USER_JOINED => BusEvent::UserJoined(Presence::from_payload(payload)),
            wire::USER_LEFT => BusEvent::UserLeft(Presence::from_payload(payload)),
            wire::ASSISTANT_TYPING | "assistant_typing" => {
                let typing = match payload {
                    Value::Bool(flag) => *flag,
                    other => other
                        .get("isTyping")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                };
                BusEvent::AssistantTyping(typing)
            }
            _ => return None,
        };
        Some(event)
    }

    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::Connected => "connected",
            BusEvent::Disconnected { .. } => "disconnected",
            BusEvent::Identity(_) => "identity",
            BusEvent::ChatEntry(_) => "chat_entry",
            BusEvent::HistorySnapshot(_) => "history_snapshot",
            BusEvent::RosterUpdate(_) => "roster_update",
            BusEvent::UserJoined(_) => "user_joined",
            BusEvent::UserLeft(_) => "user_left",
            BusEvent::AssistantTyping(_) => "assistant_typing",
        }
    }
}

// =============================================================================
// Outbound events
// =============================================================================

/// Events the client sends to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Join announcement sent right after a connection opens
    Join { username: String },
    /// Plain chat message
    ChatSend { content: String },
    /// Question for the language model
    ModelQuery { content: String, model: String },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Join { .. } => wire::JOIN,
            OutboundEvent::ChatSend { .. } => wire::CHAT_SEND,
            OutboundEvent::ModelQuery { .. } => wire::MODEL_QUERY,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::Join { username } => json!({ "username": username }),
            OutboundEvent::ChatSend { content } => json!({ "content": content }),
            OutboundEvent::ModelQuery { content, model } => {
                json!({ "content": content, "model": model })
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn array_items(payload: &Value) -> &[Value] {
    payload.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn local_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chat_entry_full_payload() {
        let payload = json!({
            "id": "m1",
            "username": "alice",
            "content": "hi",
            "timestamp": "2024-05-01T10:00:00.000Z",
            "type": "user"
        });
        let event = BusEvent::decode("message", &payload).unwrap();
        assert_eq!(
            event,
            BusEvent::ChatEntry(ChatEntry {
                id: "m1".to_string(),
                username: "alice".to_string(),
                content: "hi".to_string(),
                timestamp: "2024-05-01T10:00:00.000Z".to_string(),
                kind: EntryKind::User,
            })
        );
    }

    #[test]
    fn test_decode_chat_entry_missing_fields_defaults() {
        let event = BusEvent::decode("chat_entry", &json!({ "content": "orphan" })).unwrap();
        let BusEvent::ChatEntry(entry) = event else {
            panic!("expected chat entry");
        };
        assert_eq!(entry.content, "orphan");
        assert_eq!(entry.username, "Unknown");
        assert_eq!(entry.kind, EntryKind::User);
        assert!(entry.id.starts_with("msg_"));
        assert!(entry.timestamp.is_empty());
    }

    #[test]
    fn test_unknown_entry_type_maps_to_error() {
        let entry = ChatEntry::from_payload(&json!({ "id": "x", "type": "alert" }));
        assert_eq!(entry.kind, EntryKind::Error);
        let entry = ChatEntry::from_payload(&json!({ "id": "y", "type": "llm" }));
        assert_eq!(entry.kind, EntryKind::Llm);
    }

    #[test]
    fn test_decode_typing_defaults_to_false() {
        assert_eq!(
            BusEvent::decode("llm_typing", &json!({})),
            Some(BusEvent::AssistantTyping(false))
        );
        assert_eq!(
            BusEvent::decode("llm_typing", &json!({ "isTyping": "yes" })),
            Some(BusEvent::AssistantTyping(false))
        );
        assert_eq!(
            BusEvent::decode("assistant_typing", &json!({ "isTyping": true })),
            Some(BusEvent::AssistantTyping(true))
        );
        assert_eq!(
            BusEvent::decode("llm_typing", &Value::Bool(true)),
            Some(BusEvent::AssistantTyping(true))
        );
    }

    #[test]
    fn test_decode_roster_skips_entries_without_username() {
        let payload = json!([
            { "id": "u1", "username": "alice", "joinedAt": "2024-05-01T10:00:00Z" },
            { "id": "u2" },
            { "id": "u3", "username": "bob" }
        ]);
        let event = BusEvent::decode("users_update", &payload).unwrap();
        assert_eq!(
            event,
            BusEvent::RosterUpdate(vec![
                RosterEntry { username: "alice".to_string() },
                RosterEntry { username: "bob".to_string() },
            ])
        );
    }

    #[test]
    fn test_decode_history_non_array_is_empty() {
        assert_eq!(
            BusEvent::decode("chat_history", &json!({ "oops": true })),
            Some(BusEvent::HistorySnapshot(Vec::new()))
        );
    }

    #[test]
    fn test_decode_presence_default_username() {
        let event = BusEvent::decode("user_left", &json!({ "timestamp": "T" })).unwrap();
        assert_eq!(
            event,
            BusEvent::UserLeft(Presence {
                username: "Unknown".to_string(),
                timestamp: "T".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_unknown_event_is_ignored() {
        assert_eq!(BusEvent::decode("reaction_added", &json!({})), None);
    }

    #[test]
    fn test_system_entries_get_distinct_ids() {
        let a = ChatEntry::system("alice joined the chat", "T");
        let b = ChatEntry::system("alice joined the chat", "T");
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, EntryKind::System);
        assert_eq!(a.username, SYSTEM_SENDER);
    }

    #[test]
    fn test_outbound_wire_shapes() {
        let join = OutboundEvent::Join {
            username: "alice".to_string(),
        };
        assert_eq!(join.name(), "join");
        assert_eq!(join.payload(), json!({ "username": "alice" }));

        let query = OutboundEvent::ModelQuery {
            content: "why?".to_string(),
            model: "mistral".to_string(),
        };
        assert_eq!(query.name(), "llm_message");
        assert_eq!(query.payload(), json!({ "content": "why?", "model": "mistral" }));

        let chat = OutboundEvent::ChatSend {
            content: "hi".to_string(),
        };
        assert_eq!(chat.name(), "message");
    }
}
