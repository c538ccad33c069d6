// ABOUTME: Socket.IO-over-WebSocket backend that talks to the chat relay.
// ABOUTME: Performs the Engine.IO handshake, answers pings, and decodes relay events.

use crate::codec::{self, EnginePacket, Handshake, SocketPacket};
use crate::{BusBackend, BusEvent, BusLink, OutboundEvent, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WebSocketStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// How long `close` waits for the goodbye frames to flush
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Backend connecting to a Socket.IO relay over WebSocket
#[derive(Debug, Clone)]
pub struct SocketIoBackend {
    handshake_timeout: Duration,
}

impl SocketIoBackend {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for SocketIoBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl BusBackend for SocketIoBackend {
    fn name(&self) -> &'static str {
        "socketio"
    }

    async fn connect(
        &self,
        endpoint: &str,
        inbound: mpsc::Sender<BusEvent>,
    ) -> Result<Box<dyn BusLink>, TransportError> {
        let url = codec::websocket_url(endpoint)?;
        tracing::info!(%url, "Connecting to relay");

        let (ws, handshake) = tokio::time::timeout(self.handshake_timeout, handshake(url.as_str()))
            .await
            .map_err(|_| {
                TransportError::Unreachable(format!(
                    "handshake timed out after {}s",
                    self.handshake_timeout.as_secs()
                ))
            })??;

        tracing::debug!(
            sid = %handshake.sid,
            ping_interval_ms = handshake.ping_interval,
            ping_timeout_ms = handshake.ping_timeout,
            "Relay handshake complete"
        );

        inbound
            .send(BusEvent::Connected)
            .await
            .map_err(|_| TransportError::Protocol("event receiver dropped".to_string()))?;

        let (sink, stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);

        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_loop(
            stream,
            outbound.clone(),
            inbound,
            Arc::clone(&open),
            liveness,
        ));

        Ok(Box::new(SocketIoLink {
            outbound,
            open,
            reader,
            writer,
        }))
    }
}

/// Open the WebSocket and complete both the Engine.IO and Socket.IO handshakes
async fn handshake(url: &str) -> Result<(WebSocketStream, Handshake), TransportError> {
    let (mut ws, _) = connect_async(url)
        .await
        .map_err(|e| TransportError::Unreachable(e.to_string()))?;

    let handshake = match next_packet(&mut ws).await? {
        EnginePacket::Open(handshake) => handshake,
        other => {
            return Err(TransportError::Protocol(format!(
                "expected open packet, got {:?}",
                other
            )))
        }
    };

    send_frame(&mut ws, SocketPacket::Connect(None).to_frame()).await?;

    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Ping(data) => send_frame(&mut ws, EnginePacket::Pong(data).encode()).await?,
            EnginePacket::Message(body) => match SocketPacket::decode(&body)? {
                SocketPacket::Connect(_) => break,
                SocketPacket::ConnectError(data) => {
                    return Err(TransportError::HandshakeRejected(rejection_message(&data)))
                }
                other => tracing::debug!(?other, "Ignoring packet before connect ack"),
            },
            EnginePacket::Close => {
                return Err(TransportError::HandshakeRejected(
                    "relay closed the transport during handshake".to_string(),
                ))
            }
            _ => {}
        }
    }

    Ok((ws, handshake))
}

async fn next_packet(ws: &mut WebSocketStream) -> Result<EnginePacket, TransportError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return EnginePacket::decode(text.as_str()),
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::Unreachable(
                    "connection closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Unreachable(e.to_string())),
        }
    }
}

async fn send_frame(ws: &mut WebSocketStream, frame: String) -> Result<(), TransportError> {
    ws.send(Message::text(frame))
        .await
        .map_err(|e| TransportError::Unreachable(e.to_string()))
}

fn rejection_message(data: &Value) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| data.to_string())
}

async fn write_loop(
    mut sink: SplitSink<WebSocketStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(error = %e, "WebSocket send failed, writer stopping");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Read loop that answers pings and forwards decoded events in arrival order
async fn read_loop(
    mut stream: SplitStream<WebSocketStream>,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::Sender<BusEvent>,
    open: Arc<AtomicBool>,
    liveness: Duration,
) {
    let reason = loop {
        let text = match tokio::time::timeout(liveness, stream.next()).await {
            Err(_) => break "ping timeout".to_string(),
            Ok(None) => break "connection closed".to_string(),
            Ok(Some(Err(e))) => break e.to_string(),
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(Message::Close(_)))) => break "relay closed the connection".to_string(),
            Ok(Some(Ok(_))) => continue,
        };

        match EnginePacket::decode(text.as_str()) {
            Ok(EnginePacket::Ping(data)) => {
                let _ = outbound.send(Message::text(EnginePacket::Pong(data).encode()));
            }
            Ok(EnginePacket::Message(body)) => match SocketPacket::decode(&body) {
                Ok(SocketPacket::Event { name, payload, .. }) => {
                    match BusEvent::decode(&name, &payload) {
                        Some(event) => {
                            if inbound.send(event).await.is_err() {
                                tracing::debug!(event = %name, "Event receiver gone, discarding");
                            }
                        }
                        None => tracing::trace!(event = %name, "Ignoring unknown relay event"),
                    }
                }
                Ok(SocketPacket::Disconnect) => break "relay ended the session".to_string(),
                Ok(other) => tracing::trace!(?other, "Ignoring socket.io packet"),
                Err(e) => tracing::warn!(error = %e, "Undecodable socket.io packet"),
            },
            Ok(EnginePacket::Close) => break "relay closed the transport".to_string(),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Undecodable engine.io frame"),
        }
    };

    open.store(false, Ordering::SeqCst);
    tracing::info!(%reason, "Relay link ended");
    let _ = inbound.send(BusEvent::Disconnected { reason }).await;
}

struct SocketIoLink {
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

#[async_trait]
impl BusLink for SocketIoLink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&mut self, event: &OutboundEvent) -> Result<(), TransportError> {
        let frame = SocketPacket::Event {
            name: event.name().to_string(),
            payload: event.payload(),
            ack: None,
        }
        .to_frame();
        self.outbound
            .send(Message::text(frame))
            .map_err(|_| TransportError::Protocol("link writer stopped".to_string()))
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.reader.abort();

        let _ = self
            .outbound
            .send(Message::text(SocketPacket::Disconnect.to_frame()));
        let _ = self.outbound.send(Message::Close(None));

        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut self.writer)
            .await
            .is_err()
        {
            tracing::debug!("Writer did not flush in time, aborting");
            self.writer.abort();
        }
    }
}
