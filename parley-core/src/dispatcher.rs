// ABOUTME: Action dispatcher - turns user intents into transport calls.
// ABOUTME: Validates input locally and drops sends while disconnected.

use crate::error::ClientError;
use crate::state::SessionState;
use parley_bus::{EventReceiver, OutboundEvent, TransportError, TransportHandle};
use std::future::Future;

/// Outcome of a send that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the transport
    Emitted,
    /// Not connected; nothing was sent
    Dropped,
}

/// Owns the transport handle on behalf of the session.
///
/// Connection bookkeeping (pending connects, epochs) lives in the session
/// actor; the dispatcher only decides what reaches the wire.
#[derive(Clone)]
pub struct ActionDispatcher {
    transport: TransportHandle,
}

impl ActionDispatcher {
    pub fn new(transport: TransportHandle) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Validate a connect request and queue the transport `open`.
    ///
    /// Returns the trimmed username together with the open future. The caller
    /// records the username once the future resolves successfully.
    pub fn connect(
        &self,
        state: &SessionState,
        connecting: bool,
        username: &str,
        endpoint: &str,
    ) -> Result<
        (
            String,
            impl Future<Output = Result<EventReceiver, TransportError>> + Send + 'static,
        ),
        ClientError,
    > {
        let username = validate_username(username)?;
        if connecting || state.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }

        tracing::info!(%endpoint, %username, backend = self.transport.name(), "Connecting");
        let opening = self.transport.open(endpoint, &username);
        Ok((username, opening))
    }

    /// Queue `close`, then reset the state whether or not anything was open
    pub fn disconnect(&self, state: &mut SessionState) -> impl Future<Output = ()> + Send + 'static {
        let closing = self.transport.close();
        state.reset();
        closing
    }

    pub fn send_chat_message(
        &self,
        state: &SessionState,
        content: &str,
    ) -> Result<Delivery, ClientError> {
        let content = validate_content(content)?;
        Ok(self.emit_if_connected(
            state,
            OutboundEvent::ChatSend {
                content: content.to_string(),
            },
        ))
    }

    /// Emit a model query. The reply arrives later as a chat entry.
    pub fn send_model_query(
        &self,
        state: &SessionState,
        content: &str,
        model: &str,
    ) -> Result<Delivery, ClientError> {
        let content = validate_content(content)?;
        Ok(self.emit_if_connected(
            state,
            OutboundEvent::ModelQuery {
                content: content.to_string(),
                model: model.to_string(),
            },
        ))
    }

    fn emit_if_connected(&self, state: &SessionState, event: OutboundEvent) -> Delivery {
        if !state.is_connected() {
            tracing::debug!(event = event.name(), "Not connected, dropping send");
            return Delivery::Dropped;
        }
        self.transport.emit(event);
        Delivery::Emitted
    }
}

/// Trimmed username, or a validation error when nothing is left
pub fn validate_username(username: &str) -> Result<String, ClientError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation(
            "username must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trimmed message content, or a validation error when nothing is left
pub fn validate_content(content: &str) -> Result<&str, ClientError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation(
            "message must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
