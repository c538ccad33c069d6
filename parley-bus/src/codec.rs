// ABOUTME: Engine.IO v4 and Socket.IO v5 text packet encoding for the WebSocket transport.
// ABOUTME: Also maps an http(s) relay endpoint to its socket.io WebSocket URL.

use crate::TransportError;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Engine.IO protocol revision spoken by the relay
pub const ENGINE_IO_VERSION: &str = "4";

/// Parameters announced by the server in the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// Engine.IO packet (one WebSocket text frame)
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        payload: Value,
        ack: Option<u64>,
    },
    Ack {
        ack: u64,
        data: Value,
    },
    ConnectError(Value),
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, TransportError> {
        let mut chars = frame.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty engine.io frame".to_string()))?;
        let body = chars.as_str();

        match kind {
            '0' => serde_json::from_str::<Handshake>(body)
                .map(EnginePacket::Open)
                .map_err(|e| TransportError::Protocol(format!("bad open packet: {}", e))),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(body.to_string())),
            '3' => Ok(EnginePacket::Pong(body.to_string())),
            '4' => Ok(EnginePacket::Message(body.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(TransportError::Protocol(format!(
                "unknown engine.io packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => format!(
                "0{}",
                serde_json::json!({
                    "sid": handshake.sid,
                    "upgrades": handshake.upgrades,
                    "pingInterval": handshake.ping_interval,
                    "pingTimeout": handshake.ping_timeout,
                    "maxPayload": handshake.max_payload,
                })
            ),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(body) => format!("4{}", body),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

impl SocketPacket {
    /// Decode the body of an Engine.IO message packet.
    ///
    /// Only the default namespace is used by the relay; a namespace prefix is
    /// accepted and discarded.
    pub fn decode(body: &str) -> Result<Self, TransportError> {
        let mut chars = body.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty socket.io packet".to_string()))?;
        let mut rest = chars.as_str();

        if rest.starts_with('/') {
            rest = match rest.find(',') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            };
        }

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let ack = if digits > 0 {
            rest[..digits].parse::<u64>().ok()
        } else {
            None
        };
        let data = &rest[digits..];
        let json = if data.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(data)
                    .map_err(|e| TransportError::Protocol(format!("bad packet data: {}", e)))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect(json)),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let args = match json {
                    Some(Value::Array(args)) => args,
                    _ => {
                        return Err(TransportError::Protocol(
                            "event packet without argument array".to_string(),
                        ))
                    }
                };
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(TransportError::Protocol(
                            "event packet without a name".to_string(),
                        ))
                    }
                };
                Ok(SocketPacket::Event {
                    name,
                    payload: args.next().unwrap_or(Value::Null),
                    ack,
                })
            }
            '3' => Ok(SocketPacket::Ack {
                ack: ack.unwrap_or_default(),
                data: json.unwrap_or(Value::Null),
            }),
            '4' => Ok(SocketPacket::ConnectError(json.unwrap_or(Value::Null))),
            '5' | '6' => Err(TransportError::Protocol(
                "binary packets are not supported".to_string(),
            )),
            other => Err(TransportError::Protocol(format!(
                "unknown socket.io packet type '{}'",
                other
            ))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_string(),
            SocketPacket::Connect(Some(auth)) => format!("0{}", auth),
            SocketPacket::Disconnect => "1".to_string(),
            SocketPacket::Event { name, payload, ack } => {
                let args = Value::Array(vec![Value::String(name.clone()), payload.clone()]);
                match ack {
                    Some(id) => format!("2{}{}", id, args),
                    None => format!("2{}", args),
                }
            }
            SocketPacket::Ack { ack, data } => format!("3{}{}", ack, Value::Array(vec![data.clone()])),
            SocketPacket::ConnectError(data) => format!("4{}", data),
        }
    }

    /// Wrap this packet into the WebSocket text frame that carries it
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

/// Map a relay endpoint such as `http://localhost:3001` to its WebSocket URL
pub fn websocket_url(endpoint: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch to a websocket scheme".to_string()))?;

    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_packet() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        let packet = EnginePacket::decode(frame).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(Handshake {
                sid: "abc".to_string(),
                upgrades: vec![],
                ping_interval: 25_000,
                ping_timeout: 20_000,
                max_payload: Some(1_000_000),
            })
        );
    }

    #[test]
    fn test_decode_ping_and_message() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(
            EnginePacket::decode("40").unwrap(),
            EnginePacket::Message("0".to_string())
        );
        assert!(EnginePacket::decode("").is_err());
        assert!(EnginePacket::decode("9").is_err());
    }

    #[test]
    fn test_decode_event_packet() {
        let body = r#"2["message",{"id":"m1","content":"hi"}]"#;
        let packet = SocketPacket::decode(body).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "message".to_string(),
                payload: json!({"id": "m1", "content": "hi"}),
                ack: None,
            }
        );
    }

    #[test]
    fn test_decode_event_with_namespace_and_ack() {
        let body = r#"2/chat,12["llm_typing",{"isTyping":true}]"#;
        let packet = SocketPacket::decode(body).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                name: "llm_typing".to_string(),
                payload: json!({"isTyping": true}),
                ack: Some(12),
            }
        );
    }

    #[test]
    fn test_decode_event_without_payload_is_null() {
        let packet = SocketPacket::decode(r#"2["ping_me"]"#).unwrap();
        assert!(matches!(packet, SocketPacket::Event { payload: Value::Null, .. }));
    }

    #[test]
    fn test_decode_connect_and_connect_error() {
        assert_eq!(
            SocketPacket::decode(r#"0{"sid":"xyz"}"#).unwrap(),
            SocketPacket::Connect(Some(json!({"sid": "xyz"})))
        );
        assert_eq!(
            SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
    }

    #[test]
    fn test_decode_rejects_binary_and_garbage() {
        assert!(SocketPacket::decode(r#"51-["upload",{"_placeholder":true,"num":0}]"#).is_err());
        assert!(SocketPacket::decode(r#"2{"not":"an array"}"#).is_err());
        assert!(SocketPacket::decode("2[42]").is_err());
    }

    #[test]
    fn test_event_frame_encoding() {
        let packet = SocketPacket::Event {
            name: "join".to_string(),
            payload: json!({"username": "alice"}),
            ack: None,
        };
        assert_eq!(packet.to_frame(), r#"42["join",{"username":"alice"}]"#);
        assert_eq!(SocketPacket::Connect(None).to_frame(), "40");
        assert_eq!(SocketPacket::Disconnect.to_frame(), "41");
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
    }

    #[test]
    fn test_websocket_url_from_http_endpoint() {
        let url = websocket_url("http://localhost:3001").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:3001/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_websocket_url_keeps_path_prefix_and_tls() {
        let url = websocket_url("https://chat.example.com/relay/").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://chat.example.com/relay/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_websocket_url_rejects_bad_endpoints() {
        assert!(matches!(
            websocket_url("ftp://example.com"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            websocket_url("not a url"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }
}
