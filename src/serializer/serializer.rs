//! Serializer - turns envelopes into wire frames and back.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::SerializationError;
use super::format::Format;
use crate::envelope::{
    AnyMessage, AnyStamp, DelayStamp, Envelope, ErrorDetails, Message, RetryCount, SentStamp,
    Stamp,
};

type MessageDecoder = fn(Format, &[u8]) -> Result<Arc<dyn AnyMessage>, SerializationError>;
type StampDecoder = fn(serde_json::Value) -> Result<Arc<dyn AnyStamp>, serde_json::Error>;

#[derive(Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    message_type: String,
    format: Format,
    body: String,
    #[serde(default)]
    stamps: Vec<WireStamp>,
}

#[derive(Serialize, Deserialize)]
struct WireStamp {
    name: String,
    value: serde_json::Value,
}

/// Encodes envelopes into self-describing JSON frames.
///
/// Decoding needs to know the concrete Rust type for each message name, so
/// every message type a transport may deliver must be registered. Sendable
/// built-in stamps are registered up front; custom stamps can be added with
/// `register_stamp`.
///
/// Frame layout:
///
/// ```text
/// { "type": "app.hello", "format": "json", "body": "<base64>",
///   "stamps": [ { "name": "retry_count", "value": 1 } ] }
/// ```
#[derive(Clone)]
pub struct Serializer {
    format: Format,
    messages: Arc<HashMap<&'static str, MessageDecoder>>,
    stamps: Arc<HashMap<&'static str, StampDecoder>>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new(Format::default())
    }
}

impl Serializer {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            messages: Arc::new(HashMap::new()),
            stamps: Arc::new(HashMap::new()),
        }
        .register_stamp::<RetryCount>()
        .register_stamp::<SentStamp>()
        .register_stamp::<DelayStamp>()
        .register_stamp::<ErrorDetails>()
    }

    /// Register a message type so it can be decoded.
    pub fn register<M: Message>(mut self) -> Self {
        Arc::make_mut(&mut self.messages).insert(M::NAME, decode_message::<M>);
        self
    }

    /// Register a custom stamp kind so it survives decoding.
    pub fn register_stamp<S: Stamp>(mut self) -> Self {
        Arc::make_mut(&mut self.stamps).insert(S::NAME, decode_stamp::<S>);
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Whether a decoder is registered for `message_type`.
    pub fn knows(&self, message_type: &str) -> bool {
        self.messages.contains_key(message_type)
    }

    /// Encode the envelope's message and sendable stamps into a frame.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, SerializationError> {
        let message_type = envelope.message_name();
        let body = envelope.message().encode(self.format)?;

        let mut stamps = Vec::new();
        for stamp in envelope.stamps().iter().filter(|s| s.sendable()) {
            let value = stamp.to_value().map_err(|e| SerializationError::Encode {
                message_type: message_type.to_string(),
                reason: format!("stamp {}: {}", stamp.name(), e),
            })?;
            stamps.push(WireStamp {
                name: stamp.name().to_string(),
                value,
            });
        }

        let frame = WireFrame {
            message_type: message_type.to_string(),
            format: self.format,
            body: STANDARD.encode(body),
            stamps,
        };

        serde_json::to_vec(&frame).map_err(|e| SerializationError::Encode {
            message_type: message_type.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a frame produced by `encode`.
    ///
    /// The body is read with the format recorded in the frame, not the
    /// serializer's own format, so producers and consumers may differ.
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope, SerializationError> {
        let frame: WireFrame =
            serde_json::from_slice(bytes).map_err(|e| SerializationError::Frame(e.to_string()))?;

        let decoder = self
            .messages
            .get(frame.message_type.as_str())
            .ok_or_else(|| SerializationError::UnknownMessageType(frame.message_type.clone()))?;

        let body = STANDARD
            .decode(frame.body.as_bytes())
            .map_err(|e| SerializationError::Frame(format!("body is not base64: {}", e)))?;
        let message = decoder(frame.format, &body)?;

        let mut stamps = Vec::with_capacity(frame.stamps.len());
        for stamp in frame.stamps {
            let Some(decode) = self.stamps.get(stamp.name.as_str()) else {
                warn!(
                    stamp = %stamp.name,
                    message_type = %frame.message_type,
                    "skipping unknown stamp"
                );
                continue;
            };
            let decoded = decode(stamp.value).map_err(|e| SerializationError::Decode {
                message_type: frame.message_type.clone(),
                reason: format!("stamp {}: {}", stamp.name, e),
            })?;
            stamps.push(decoded);
        }

        Ok(Envelope::from_parts(message, stamps))
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut messages: Vec<_> = self.messages.keys().collect();
        messages.sort();
        f.debug_struct("Serializer")
            .field("format", &self.format)
            .field("messages", &messages)
            .finish()
    }
}

fn decode_message<M: Message>(
    format: Format,
    bytes: &[u8],
) -> Result<Arc<dyn AnyMessage>, SerializationError> {
    let message: M = format.decode(M::NAME, bytes)?;
    Ok(Arc::new(message))
}

fn decode_stamp<S: Stamp>(value: serde_json::Value) -> Result<Arc<dyn AnyStamp>, serde_json::Error> {
    let stamp: S = serde_json::from_value(value)?;
    Ok(Arc::new(stamp))
}
