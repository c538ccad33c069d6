// ABOUTME: Session actor - the single writer that owns SessionState.
// ABOUTME: Serializes inbound events, user intents, connect completions and refresh ticks.

use crate::dispatcher::{ActionDispatcher, Delivery};
use crate::error::ClientError;
use crate::refresh::{
    RefreshPolicy, RefreshReceiver, RefreshScheduler, RefreshSignal, REFRESH_BUFFER,
};
use crate::router;
use crate::state::SessionState;
use parley_bus::{BusEvent, EventReceiver, TransportError, TransportHandle};
use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Settings for a session actor
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub refresh: RefreshPolicy,
    /// Model selected before the user picks one
    pub default_model: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshPolicy::default(),
            default_model: crate::config::DEFAULT_MODEL.to_string(),
        }
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Intent {
    Connect {
        username: String,
        endpoint: String,
        reply: Reply<Result<(), ClientError>>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    SendChat {
        content: String,
        reply: Reply<Result<Delivery, ClientError>>,
    },
    SendQuery {
        content: String,
        model: String,
        reply: Reply<Result<Delivery, ClientError>>,
    },
    SelectModel(String),
    Refresh,
    Snapshot(Reply<SessionState>),
}

/// Result of a transport `open` that ran off the actor
struct ConnectDone {
    epoch: u64,
    result: Result<EventReceiver, TransportError>,
}

struct PendingConnect {
    epoch: u64,
    username: String,
    reply: Reply<Result<(), ClientError>>,
}

/// Presentation-side handle: read-only snapshots plus intents.
///
/// Every method queues its intent before returning, so intents are applied in
/// the order they were issued even if the returned futures are awaited later.
#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::UnboundedSender<Intent>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    fn call<T: Send + 'static>(
        &self,
        make: impl FnOnce(Reply<T>) -> Intent,
    ) -> impl Future<Output = Result<T, ClientError>> + Send + 'static {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = self.intents.send(make(reply_tx)).is_ok();
        async move {
            if !queued {
                return Err(ClientError::SessionClosed);
            }
            reply_rx.await.map_err(|_| ClientError::SessionClosed)
        }
    }

    fn post(&self, intent: Intent) -> Result<(), ClientError> {
        self.intents
            .send(intent)
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Connect to `endpoint` as `username`.
    ///
    /// Resolves once the transport is open; identity, roster and history
    /// arrive afterwards as events.
    pub fn request_connect(
        &self,
        username: &str,
        endpoint: &str,
    ) -> impl Future<Output = Result<(), ClientError>> + Send + 'static {
        let username = username.to_string();
        let endpoint = endpoint.to_string();
        let call = self.call(|reply| Intent::Connect {
            username,
            endpoint,
            reply,
        });
        async move { call.await? }
    }

    /// Close the connection and reset the session. Safe at any point,
    /// including while a connect is still in flight.
    pub fn request_disconnect(&self) -> impl Future<Output = Result<(), ClientError>> + Send + 'static {
        self.call(|reply| Intent::Disconnect { reply })
    }

    pub fn send_chat_message(
        &self,
        content: &str,
    ) -> impl Future<Output = Result<Delivery, ClientError>> + Send + 'static {
        let content = content.to_string();
        let call = self.call(|reply| Intent::SendChat { content, reply });
        async move { call.await? }
    }

    pub fn send_model_query(
        &self,
        content: &str,
        model: &str,
    ) -> impl Future<Output = Result<Delivery, ClientError>> + Send + 'static {
        let content = content.to_string();
        let model = model.to_string();
        let call = self.call(|reply| Intent::SendQuery {
            content,
            model,
            reply,
        });
        async move { call.await? }
    }

    pub fn select_model(&self, model: &str) -> Result<(), ClientError> {
        self.post(Intent::SelectModel(model.to_string()))
    }

    /// Ask for an immediate refresh signal
    pub fn request_refresh(&self) -> Result<(), ClientError> {
        self.post(Intent::Refresh)
    }

    /// State after every intent issued before this call has been applied
    pub fn snapshot(&self) -> impl Future<Output = Result<SessionState, ClientError>> + Send + 'static {
        self.call(Intent::Snapshot)
    }

    /// Latest published state, updated after every mutation
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }
}

/// Spawn a session actor that drives `transport`
pub fn spawn_session(
    transport: TransportHandle,
    config: SessionConfig,
) -> (SessionHandle, RefreshReceiver) {
    let state = SessionState::new(config.default_model);
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(state.clone());
    let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_BUFFER);
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let actor = SessionActor {
        dispatcher: ActionDispatcher::new(transport),
        state,
        events: None,
        pending: None,
        epoch: 0,
        refresh: RefreshScheduler::new(config.refresh),
        state_tx,
        refresh_tx,
        done_tx,
    };
    tokio::spawn(actor.run(intent_rx, done_rx));

    (
        SessionHandle {
            intents: intent_tx,
            state: state_rx,
        },
        RefreshReceiver::new(refresh_rx),
    )
}

// =============================================================================
// Actor
// =============================================================================

enum Step {
    Opened(ConnectDone),
    Inbound(Option<BusEvent>),
    Intent(Intent),
    Tick,
    Shutdown,
}

struct SessionActor {
    dispatcher: ActionDispatcher,
    state: SessionState,
    /// Inbound events of the current connection
    events: Option<EventReceiver>,
    pending: Option<PendingConnect>,
    /// Bumped by every connect and disconnect; stale completions are discarded
    epoch: u64,
    refresh: RefreshScheduler,
    state_tx: watch::Sender<SessionState>,
    refresh_tx: mpsc::Sender<RefreshSignal>,
    done_tx: mpsc::UnboundedSender<ConnectDone>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        mut done: mpsc::UnboundedReceiver<ConnectDone>,
    ) {
        tracing::debug!(backend = self.dispatcher.transport_name(), "Session actor started");

        loop {
            self.refresh.arm(self.state.is_connected(), Instant::now());
            let deadline = self.refresh.deadline();
            // Completions before events before intents, so an intent always
            // observes every event delivered ahead of it.
            let step = tokio::select! {
                biased;
                Some(completion) = done.recv() => Step::Opened(completion),
                event = next_event(&mut self.events) => Step::Inbound(event),
                intent = intents.recv() => match intent {
                    Some(intent) => Step::Intent(intent),
                    None => Step::Shutdown,
                },
                _ = sleep_until(deadline) => Step::Tick,
            };

            match step {
                Step::Opened(completion) => self.on_connect_done(completion),
                Step::Inbound(Some(event)) => self.on_event(event),
                Step::Inbound(None) => self.on_link_gone(),
                Step::Intent(intent) => self.on_intent(intent),
                Step::Tick => {
                    if let Some(signal) = self.refresh.poll_expired(Instant::now()) {
                        self.signal(signal);
                    }
                }
                Step::Shutdown => break,
            }
        }

        self.events = None;
        self.dispatcher.disconnect(&mut self.state).await;
        tracing::debug!("Session actor stopped");
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    fn signal(&self, signal: RefreshSignal) {
        if self.refresh_tx.try_send(signal).is_err() {
            tracing::trace!(?signal, "Refresh signal coalesced");
        }
    }

    fn on_event(&mut self, event: BusEvent) {
        tracing::trace!(event = event.kind(), "Applying event");
        let lost = matches!(event, BusEvent::Disconnected { .. });
        router::apply(&mut self.state, event);
        if lost {
            // The link is finished; a new connect is required
            self.events = None;
        }
        self.publish();
    }

    fn on_link_gone(&mut self) {
        self.events = None;
        if self.state.is_connected() {
            router::apply(
                &mut self.state,
                BusEvent::Disconnected {
                    reason: "event stream closed".to_string(),
                },
            );
            self.publish();
        }
    }

    fn on_connect_done(&mut self, completion: ConnectDone) {
        let pending = match self.pending.take() {
            Some(pending) if pending.epoch == completion.epoch => pending,
            other => {
                self.pending = other;
                tracing::debug!(epoch = completion.epoch, "Discarding stale connect completion");
                return;
            }
        };

        match completion.result {
            Ok(events) => {
                self.events = Some(events);
                self.state.username = Some(pending.username);
                self.publish();
                let _ = pending.reply.send(Ok(()));
            }
            Err(e) => {
                let _ = pending.reply.send(Err(ClientError::Connection(e)));
            }
        }
    }

    fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::Connect {
                username,
                endpoint,
                reply,
            } => {
                let connecting = self.pending.is_some() || self.events.is_some();
                match self
                    .dispatcher
                    .connect(&self.state, connecting, &username, &endpoint)
                {
                    Ok((username, opening)) => {
                        self.epoch += 1;
                        let epoch = self.epoch;
                        self.pending = Some(PendingConnect {
                            epoch,
                            username,
                            reply,
                        });
                        let done_tx = self.done_tx.clone();
                        tokio::spawn(async move {
                            let result = opening.await;
                            let _ = done_tx.send(ConnectDone { epoch, result });
                        });
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Intent::Disconnect { reply } => {
                self.epoch += 1;
                if let Some(pending) = self.pending.take() {
                    let _ = pending.reply.send(Err(ClientError::Cancelled));
                }
                self.events = None;
                self.refresh.cancel();
                let closing = self.dispatcher.disconnect(&mut self.state);
                self.publish();
                tracing::info!("Disconnected by user");
                tokio::spawn(async move {
                    closing.await;
                    let _ = reply.send(());
                });
            }
            Intent::SendChat { content, reply } => {
                let _ = reply.send(self.dispatcher.send_chat_message(&self.state, &content));
            }
            Intent::SendQuery {
                content,
                model,
                reply,
            } => {
                let _ = reply.send(
                    self.dispatcher
                        .send_model_query(&self.state, &content, &model),
                );
            }
            Intent::SelectModel(model) => {
                tracing::debug!(%model, "Model selected");
                self.state.selected_model = model;
                self.publish();
            }
            Intent::Refresh => {
                let signal = self
                    .refresh
                    .manual(self.state.is_connected(), Instant::now());
                self.signal(signal);
            }
            Intent::Snapshot(reply) => {
                let _ = reply.send(self.state.clone());
            }
        }
    }
}

async fn next_event(events: &mut Option<EventReceiver>) -> Option<BusEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
