// ABOUTME: Core BusBackend and BusLink traits that every transport implements.
// ABOUTME: A backend opens links; a link carries outbound events until it is closed.

use crate::{BusEvent, OutboundEvent, TransportError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Opens connections to a relay.
///
/// A successful `connect` must deliver [`BusEvent::Connected`] into `inbound`
/// before any other event, then keep delivering decoded relay events in arrival
/// order. When the link ends for any reason other than [`BusLink::close`], the
/// backend delivers a final [`BusEvent::Disconnected`].
#[async_trait]
pub trait BusBackend: Send + Sync + 'static {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Establish a link to `endpoint`
    async fn connect(
        &self,
        endpoint: &str,
        inbound: mpsc::Sender<BusEvent>,
    ) -> Result<Box<dyn BusLink>, TransportError>;
}

/// One live connection.
#[async_trait]
pub trait BusLink: Send {
    /// Whether the link can still carry outbound events
    fn is_open(&self) -> bool;

    /// Queue an event for delivery. Must not wait on the network.
    fn send(&mut self, event: &OutboundEvent) -> Result<(), TransportError>;

    /// Tear the link down. No further inbound events are delivered afterwards.
    async fn close(&mut self);
}
