// ABOUTME: Client-side session synchronization for the parley chat relay
// ABOUTME: Owns session state, routes bus events, dispatches intents, schedules refreshes

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod paths;
pub mod refresh;
pub mod router;
pub mod session;
pub mod state;

pub use dispatcher::{ActionDispatcher, Delivery};
pub use error::ClientError;
pub use refresh::{RefreshPolicy, RefreshReceiver, RefreshSignal};
pub use session::{spawn_session, SessionConfig, SessionHandle};
pub use state::{ConnectionStatus, SessionState};

// Re-export bus types the presentation layer renders
pub use parley_bus::{ChatEntry, EntryKind, RosterEntry, TransportHandle, UserIdentity};
