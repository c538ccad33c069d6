// ABOUTME: Session state model: connection status, identity, roster, log, typing, model.
// ABOUTME: Plain data owned by the session actor; readers only ever see clones.

use crate::config::DEFAULT_MODEL;
use parley_bus::{ChatEntry, RosterEntry, UserIdentity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connected => "connected",
        }
    }
}

/// Everything the view needs to render one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub status: ConnectionStatus,
    /// Assigned by the relay after join; cleared on disconnect
    pub identity: Option<UserIdentity>,
    /// Last roster snapshot, replaced wholesale
    pub roster: Vec<RosterEntry>,
    /// Append-ordered; a history snapshot replaces it
    pub messages: Vec<ChatEntry>,
    pub assistant_typing: bool,
    /// Name recorded by a successful connect request
    pub username: Option<String>,
    /// Survives disconnects
    pub selected_model: String,
}

impl SessionState {
    pub fn new(selected_model: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            identity: None,
            roster: Vec::new(),
            messages: Vec::new(),
            assistant_typing: false,
            username: None,
            selected_model: selected_model.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Return to the empty initial state, keeping the selected model
    pub fn reset(&mut self) {
        let model = std::mem::take(&mut self.selected_model);
        *self = Self::new(model);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}
