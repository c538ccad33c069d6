// ABOUTME: Mock backend for testing - records emits and lets tests inject relay events.
// ABOUTME: Allows deterministic tests without a running relay server.
//!
//! # Example
//!
//! ```no_run
//! use parley_bus::backends::mock::MockBus;
//! use parley_bus::{BusEvent, TransportHandle};
//!
//! # async fn example() {
//! let bus = MockBus::new();
//! let controller = bus.controller();
//! let handle = TransportHandle::spawn(bus);
//!
//! let mut events = handle.open("http://relay.test", "alice").await.unwrap();
//! assert_eq!(events.recv().await, Some(BusEvent::Connected));
//!
//! controller.push(BusEvent::AssistantTyping(true));
//! assert_eq!(events.recv().await, Some(BusEvent::AssistantTyping(true)));
//! # }
//! ```

use crate::{BusBackend, BusEvent, BusLink, OutboundEvent, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Produces the relay's reaction to an outbound event
pub trait Responder: Send {
    fn respond(&mut self, event: &OutboundEvent) -> Vec<BusEvent>;
}

impl<F> Responder for F
where
    F: FnMut(&OutboundEvent) -> Vec<BusEvent> + Send,
{
    fn respond(&mut self, event: &OutboundEvent) -> Vec<BusEvent> {
        self(event)
    }
}

#[derive(Default)]
struct MockState {
    next_link_id: u64,
    current: Option<LiveLink>,
    refusal: Option<TransportError>,
    connect_delay: Option<Duration>,
    endpoints: Vec<String>,
    emitted: Vec<OutboundEvent>,
    responder: Option<Box<dyn Responder>>,
}

struct LiveLink {
    id: u64,
    inbound: mpsc::Sender<BusEvent>,
}

type SharedState = Arc<Mutex<MockState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock backend for testing
pub struct MockBus {
    state: SharedState,
}

impl MockBus {
    /// Create a mock bus that accepts every connection
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// React to outbound events with scripted relay events
    pub fn with_responder(self, responder: impl Responder + 'static) -> Self {
        lock(&self.state).responder = Some(Box::new(responder));
        self
    }

    /// Delay every connect by `delay` before completing it
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        lock(&self.state).connect_delay = Some(delay);
        self
    }

    /// Handle used by tests to observe and drive the bus
    pub fn controller(&self) -> MockController {
        MockController {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusBackend for MockBus {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        endpoint: &str,
        inbound: mpsc::Sender<BusEvent>,
    ) -> Result<Box<dyn BusLink>, TransportError> {
        let delay = {
            let mut state = lock(&self.state);
            state.endpoints.push(endpoint.to_string());
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(err) = state.refusal.clone() {
            return Err(err);
        }

        state.next_link_id += 1;
        let id = state.next_link_id;
        let _ = inbound.try_send(BusEvent::Connected);
        state.current = Some(LiveLink { id, inbound });

        Ok(Box::new(MockLink {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockLink {
    id: u64,
    state: SharedState,
}

#[async_trait]
impl BusLink for MockLink {
    fn is_open(&self) -> bool {
        lock(&self.state)
            .current
            .as_ref()
            .is_some_and(|live| live.id == self.id)
    }

    fn send(&mut self, event: &OutboundEvent) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.emitted.push(event.clone());

        let replies = match state.responder.as_mut() {
            Some(responder) => responder.respond(event),
            None => Vec::new(),
        };
        if let Some(live) = state.current.as_ref().filter(|live| live.id == self.id) {
            for reply in replies {
                let _ = live.inbound.try_send(reply);
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        if state.current.as_ref().is_some_and(|live| live.id == self.id) {
            state.current = None;
        }
    }
}

/// Test-side view of a [`MockBus`]
#[derive(Clone)]
pub struct MockController {
    state: SharedState,
}

impl MockController {
    /// Deliver an event on the live connection. Returns false when none is open.
    pub fn push(&self, event: BusEvent) -> bool {
        match lock(&self.state).current.as_ref() {
            Some(live) => live.inbound.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Simulate the relay dropping the connection
    pub fn drop_connection(&self, reason: &str) {
        if let Some(live) = lock(&self.state).current.take() {
            let _ = live.inbound.try_send(BusEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Make every following connect fail with `err`
    pub fn refuse_connections(&self, err: TransportError) {
        lock(&self.state).refusal = Some(err);
    }

    /// Accept connections again
    pub fn accept_connections(&self) {
        lock(&self.state).refusal = None;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).current.is_some()
    }

    /// Endpoints of every connect attempt, in order
    pub fn connect_attempts(&self) -> Vec<String> {
        lock(&self.state).endpoints.clone()
    }

    /// Every event handed to a live link, in order
    pub fn emitted(&self) -> Vec<OutboundEvent> {
        lock(&self.state).emitted.clone()
    }
}
