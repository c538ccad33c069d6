// ABOUTME: Message bus transport for the parley chat client.
// ABOUTME: Provides the TransportHandle, typed bus events, and pluggable backends.

pub mod codec;
pub mod error;
pub mod event;
pub mod handle;
pub mod traits;

pub mod backends;
pub mod testing;

pub use error::TransportError;
pub use event::{
    BusEvent, ChatEntry, EntryKind, OutboundEvent, Presence, RosterEntry, UserIdentity,
};
pub use handle::{EventReceiver, TransportHandle};
pub use traits::{BusBackend, BusLink};
