// ABOUTME: TransportHandle provides a Send+Sync front for a backend worker task.
// ABOUTME: Commands are queued in program order; emits never wait on the network.

use crate::{BusBackend, BusEvent, BusLink, OutboundEvent, TransportError};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

/// Capacity of the per-connection inbound event channel
pub const EVENT_BUFFER: usize = 2048;

/// Commands sent from TransportHandle to the backend worker
#[derive(Debug)]
pub enum Command {
    Open {
        endpoint: String,
        username: String,
        reply: oneshot::Sender<Result<EventReceiver, TransportError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Emit(OutboundEvent),
}

/// Send + Sync handle to a single logical bus connection.
///
/// The worker task owns the live link, so `open`, `close` and `emit` are
/// applied strictly in the order they were issued, even when the caller does
/// not await the returned futures right away.
#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::UnboundedSender<Command>,
    name: &'static str,
}

impl TransportHandle {
    /// Spawn a worker for `backend` and return its handle
    pub fn spawn<B: BusBackend>(backend: B) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = backend.name();
        tokio::spawn(run_worker(backend, rx));
        Self { tx, name }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Connect to `endpoint` and announce `username`.
    ///
    /// The command is queued immediately; the returned future resolves once the
    /// handshake finished and the join announcement was handed to the link.
    pub fn open(
        &self,
        endpoint: &str,
        username: &str,
    ) -> impl Future<Output = Result<EventReceiver, TransportError>> + Send + 'static {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = self
            .tx
            .send(Command::Open {
                endpoint: endpoint.to_string(),
                username: username.to_string(),
                reply: reply_tx,
            })
            .is_ok();

        async move {
            if !queued {
                return Err(TransportError::WorkerClosed);
            }
            reply_rx.await.map_err(|_| TransportError::WorkerClosed)?
        }
    }

    /// Close the current link. Safe to call when nothing is connected.
    pub fn close(&self) -> impl Future<Output = ()> + Send + 'static {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = self.tx.send(Command::Close { reply: reply_tx }).is_ok();

        async move {
            if queued {
                let _ = reply_rx.await;
            }
        }
    }

    /// Fire-and-forget send. Dropped when no link is open.
    pub fn emit(&self, event: OutboundEvent) {
        if self.tx.send(Command::Emit(event)).is_err() {
            tracing::debug!(backend = self.name, "Transport worker gone, dropping event");
        }
    }
}

async fn run_worker<B: BusBackend>(backend: B, mut rx: mpsc::UnboundedReceiver<Command>) {
    let name = backend.name();
    let mut link: Option<Box<dyn BusLink>> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Open {
                endpoint,
                username,
                reply,
            } => {
                if let Some(mut previous) = link.take() {
                    tracing::debug!(backend = name, "Closing previous link before reopening");
                    previous.close().await;
                }

                let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
                let result = match backend.connect(&endpoint, event_tx).await {
                    Ok(mut opened) => {
                        let join = OutboundEvent::Join {
                            username: username.clone(),
                        };
                        match opened.send(&join) {
                            Ok(()) => {
                                tracing::info!(backend = name, %endpoint, %username, "Connected to relay");
                                link = Some(opened);
                                Ok(EventReceiver::new(event_rx))
                            }
                            Err(e) => {
                                tracing::warn!(backend = name, error = %e, "Join announcement failed");
                                opened.close().await;
                                Err(e)
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(backend = name, %endpoint, error = %e, "Connection failed");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                if let Some(mut current) = link.take() {
                    current.close().await;
                    tracing::info!(backend = name, "Disconnected from relay");
                }
                let _ = reply.send(());
            }
            Command::Emit(event) => match link.as_mut() {
                Some(current) if current.is_open() => {
                    if let Err(e) = current.send(&event) {
                        tracing::warn!(backend = name, event = event.name(), error = %e, "Emit failed");
                    }
                }
                _ => {
                    tracing::debug!(backend = name, event = event.name(), "Not connected, dropping event");
                }
            },
        }
    }

    if let Some(mut current) = link.take() {
        current.close().await;
    }
    tracing::debug!(backend = name, "Transport worker stopped");
}

/// Receiver for the inbound events of one connection.
///
/// Dropping it unregisters the connection: later events are discarded.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<BusEvent>,
}

impl EventReceiver {
    /// Create a new EventReceiver wrapping the given channel
    pub fn new(rx: mpsc::Receiver<BusEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event, or None once the connection is gone
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.rx.recv().await
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.rx.try_recv().ok()
    }
}
