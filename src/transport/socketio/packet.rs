//! Engine.IO and Socket.IO packet codec.
//!
//! # Wire Format
//!
//! Every WebSocket text frame is one Engine.IO packet: a type digit
//! followed by its payload. Message packets (`4`) carry one Socket.IO
//! packet: a type digit, an optional `/namespace,` prefix, an optional
//! ack id, and optional JSON data.
//!
//! | Frame | Meaning |
//! |-------|---------|
//! | `0{"sid":..,"pingInterval":..}` | open |
//! | `1` | close |
//! | `2` / `3` | ping / pong |
//! | `40` / `40/chat,` | namespace connect |
//! | `41/chat,` | namespace disconnect |
//! | `42/chat,["message","hi"]` | event |
//! | `4312[]` | ack for id 12 |
//! | `44/chat,"Invalid namespace"` | namespace error |
//!
//! The root namespace is `/` on the wire and carries no prefix.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Wire name of the root namespace.
pub const ROOT_NAMESPACE: &str = "/";

/// Returns the wire name of a client namespace (`""` is the root).
#[inline]
#[must_use]
pub fn wire_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        ROOT_NAMESPACE
    } else {
        namespace
    }
}

// ============================================================================
// OpenInfo
// ============================================================================

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session id.
    pub sid: String,
    /// Transports the server offers to upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Client ping period in milliseconds.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a ping before closing.
    pub ping_timeout: u64,
}

// ============================================================================
// SocketPacket
// ============================================================================

/// Socket.IO packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketPacketKind {
    /// `0`
    Connect,
    /// `1`
    Disconnect,
    /// `2`
    Event,
    /// `3`
    Ack,
    /// `4`
    Error,
}

impl SocketPacketKind {
    const fn digit(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::Error => '4',
        }
    }

    fn from_digit(c: char) -> Result<Self> {
        match c {
            '0' => Ok(Self::Connect),
            '1' => Ok(Self::Disconnect),
            '2' => Ok(Self::Event),
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::Error),
            '5' | '6' => Err(Error::protocol("binary packets are not supported")),
            other => Err(Error::protocol(format!(
                "unknown socket packet type {other:?}"
            ))),
        }
    }
}

/// One Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Packet type.
    pub kind: SocketPacketKind,
    /// Wire namespace (`/` for the root).
    pub namespace: String,
    /// Ack id.
    pub id: Option<u64>,
    /// JSON data.
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Namespace connect request.
    #[must_use]
    pub fn connect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Connect,
            namespace: namespace.to_string(),
            id: None,
            data: None,
        }
    }

    /// Namespace disconnect.
    #[must_use]
    pub fn disconnect(namespace: &str) -> Self {
        Self {
            kind: SocketPacketKind::Disconnect,
            namespace: namespace.to_string(),
            id: None,
            data: None,
        }
    }

    /// Event whose data is `args` (event name first).
    #[must_use]
    pub fn event(namespace: &str, args: &[Value]) -> Self {
        Self {
            kind: SocketPacketKind::Event,
            namespace: namespace.to_string(),
            id: None,
            data: Some(Value::Array(args.to_vec())),
        }
    }

    /// Encodes the packet without the Engine.IO prefix.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());

        if self.namespace != ROOT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.id {
            let _ = write!(out, "{id}");
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Decodes a packet without the Engine.IO prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for an empty or unknown packet and
    /// [`Error::Json`] for malformed data.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::protocol("empty socket packet"))
            .and_then(SocketPacketKind::from_digit)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
            rest = tail;
            namespace.to_string()
        } else {
            ROOT_NAMESPACE.to_string()
        };

        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse()
                .map_err(|_| Error::protocol(format!("bad ack id in {text:?}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            id,
            data,
        })
    }

    /// Splits event data into its name and arguments.
    #[must_use]
    pub fn event_parts(&self) -> Option<(&str, &[Value])> {
        match &self.data {
            Some(Value::Array(items)) => {
                let (name, args) = items.split_first()?;
                Some((name.as_str()?, args))
            }
            _ => None,
        }
    }

    /// Returns the error message of an error packet.
    #[must_use]
    pub fn error_message(&self) -> String {
        match &self.data {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
            Some(other) => other.to_string(),
            None => "namespace connect refused".to_string(),
        }
    }
}

// ============================================================================
// EnginePacket
// ============================================================================

/// One Engine.IO packet (one WebSocket text frame).
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// `0`: handshake data.
    Open(OpenInfo),
    /// `1`
    Close,
    /// `2` with optional probe payload.
    Ping(String),
    /// `3` with optional probe payload.
    Pong(String),
    /// `4`: a Socket.IO packet.
    Message(SocketPacket),
    /// `5`
    Upgrade,
    /// `6`
    Noop,
}

impl EnginePacket {
    /// Encodes the packet as a text frame.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(info) => format!("0{}", serde_json::to_string(info).unwrap_or_default()),
            Self::Close => "1".to_string(),
            Self::Ping(payload) => format!("2{payload}"),
            Self::Pong(payload) => format!("3{payload}"),
            Self::Message(packet) => format!("4{}", packet.encode()),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }

    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for unknown packet types and
    /// [`Error::Json`] for malformed payloads.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(Error::protocol("empty engine packet"));
        };
        let rest = chars.as_str();

        let packet = match kind {
            '0' => Self::Open(serde_json::from_str(rest)?),
            '1' => Self::Close,
            '2' => Self::Ping(rest.to_string()),
            '3' => Self::Pong(rest.to_string()),
            '4' => Self::Message(SocketPacket::decode(rest)?),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => {
                return Err(Error::protocol(format!(
                    "unknown engine packet type {other:?}"
                )));
            }
        };
        Ok(packet)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet = EnginePacket::decode(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#,
        )
        .unwrap();

        let EnginePacket::Open(info) = packet else {
            panic!("expected open");
        };
        assert_eq!(info.sid, "abc");
        assert_eq!(info.ping_interval, 25000);
    }

    #[test]
    fn test_root_connect_has_no_prefix() {
        let packet = EnginePacket::decode("40").unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::connect(ROOT_NAMESPACE))
        );
        assert_eq!(
            EnginePacket::Message(SocketPacket::connect("/")).encode(),
            "40"
        );
    }

    #[test]
    fn test_namespaced_event() {
        let packet = SocketPacket::event("/chat", &[json!("message"), json!({ "text": "hi" })]);
        let text = EnginePacket::Message(packet.clone()).encode();
        assert_eq!(text, r#"42/chat,["message",{"text":"hi"}]"#);

        let decoded = SocketPacket::decode(&text[1..]).unwrap();
        assert_eq!(decoded, packet);
        let (name, args) = decoded.event_parts().unwrap();
        assert_eq!(name, "message");
        assert_eq!(args, &[json!({ "text": "hi" })]);
    }

    #[test]
    fn test_ack_id_and_namespace() {
        let packet = SocketPacket::decode(r#"3/chat,12["ok"]"#).unwrap();
        assert_eq!(packet.kind, SocketPacketKind::Ack);
        assert_eq!(packet.namespace, "/chat");
        assert_eq!(packet.id, Some(12));
        assert_eq!(packet.data, Some(json!(["ok"])));
    }

    #[test]
    fn test_namespace_without_trailing_comma() {
        let packet = SocketPacket::decode("1/chat").unwrap();
        assert_eq!(packet, SocketPacket::disconnect("/chat"));
    }

    #[test]
    fn test_error_message() {
        let packet = SocketPacket::decode(r#"4/admin,"Invalid namespace""#).unwrap();
        assert_eq!(packet.kind, SocketPacketKind::Error);
        assert_eq!(packet.error_message(), "Invalid namespace");

        let packet = SocketPacket::decode(r#"4/admin,{"message":"not authorized"}"#).unwrap();
        assert_eq!(packet.error_message(), "not authorized");
    }

    #[test]
    fn test_rejects_binary_and_garbage() {
        assert!(matches!(
            SocketPacket::decode("5-1[]"),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(EnginePacket::decode(""), Err(Error::Protocol { .. })));
        assert!(matches!(EnginePacket::decode("9"), Err(Error::Protocol { .. })));
        assert!(matches!(EnginePacket::decode("42[oops"), Err(Error::Json(_))));
    }

    #[test]
    fn test_ping_probe_payload() {
        assert_eq!(EnginePacket::decode("2probe").unwrap(), EnginePacket::Ping("probe".into()));
        assert_eq!(EnginePacket::Pong("probe".into()).encode(), "3probe");
    }

    #[test]
    fn test_wire_namespace() {
        assert_eq!(wire_namespace(""), "/");
        assert_eq!(wire_namespace("/chat"), "/chat");
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-zA-Z0-9 ,/\"{}\\[\\]]{0,12}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_event_packets_decode_to_what_was_encoded(
            namespace in prop_oneof![Just("/".to_string()), "/[a-z]{1,8}"],
            name in "[a-zA-Z_]{1,12}",
            args in prop::collection::vec(json_leaf(), 0..4),
            id in prop::option::of(0u64..100_000),
        ) {
            let mut data = vec![Value::from(name)];
            data.extend(args);
            let mut packet = SocketPacket::event(&namespace, &data);
            packet.id = id;

            let frame = EnginePacket::Message(packet.clone()).encode();
            prop_assert_eq!(EnginePacket::decode(&frame).unwrap(), EnginePacket::Message(packet));
        }

        #[test]
        fn prop_decode_never_panics(text in "\\PC{0,40}") {
            let _ = EnginePacket::decode(&text);
        }
    }
}
