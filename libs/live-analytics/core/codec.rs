//! JSON wire format
//!
//! # Outbound
//!
//! ```text
//! {"type":"Configure","min_speakers":2,"max_speakers":6}
//! {"type":"KeepAlive"}
//! {"type":"Finalize"}
//! {"type":"CloseStream"}
//! ```
//!
//! # Inbound
//!
//! Two framings are accepted:
//!
//! ```text
//! {"type":"speaker_change","data":{...}}                 flat (`type` or `event_type`)
//! {"event":{"event_type":"speaker_change","data":{...}}} nested
//! ```
//!
//! The listener receives `data` from the object that carried the
//! discriminator, or that whole object when it has no `data` member.

use crate::core::config::SessionConfiguration;
use crate::core::events::{ErrorEvent, EventKind, SessionEvent};
use crate::error::{LiveError, Result};
use crate::traits::MessageCodec;
use crate::message::WsMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Outbound control frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    /// Options to merge into the server-side session
    Configure(SessionConfiguration),
    /// Keep an idle stream from timing out
    KeepAlive,
    /// Flush pending partial results
    Finalize,
    /// Ask the server to close gracefully
    CloseStream,
}

impl ControlFrame {
    /// Value of the `type` discriminator
    pub fn name(&self) -> &'static str {
        match self {
            ControlFrame::Configure(_) => "Configure",
            ControlFrame::KeepAlive => "KeepAlive",
            ControlFrame::Finalize => "Finalize",
            ControlFrame::CloseStream => "CloseStream",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read back a frame produced by [`to_json`](Self::to_json)
    pub fn decode(text: &str) -> Result<ControlFrame> {
        serde_json::from_str(text).map_err(|e| LiveError::Parse(e.to_string()))
    }
}

/// Default codec: JSON text frames
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode(&self, frame: &ControlFrame) -> Result<WsMessage> {
        frame.to_json().map(WsMessage::Text)
    }

    fn decode(&self, message: &WsMessage) -> SessionEvent {
        let parsed = match message {
            WsMessage::Text(text) => serde_json::from_str::<Value>(text),
            WsMessage::Binary(bytes) => serde_json::from_slice::<Value>(bytes),
        };

        match parsed {
            Ok(frame) => classify(frame, message),
            Err(e) => {
                let raw = message.to_text_lossy();
                warn!("Failed to parse inbound frame ({} bytes): {}", message.len(), e);
                SessionEvent::Error(ErrorEvent::parse(e.to_string(), raw))
            }
        }
    }
}

/// Map a parsed frame onto the event taxonomy
///
/// `message` is the frame `frame` was parsed from; an `Unhandled` event
/// keeps its text verbatim.
pub fn classify(frame: Value, message: &WsMessage) -> SessionEvent {
    let found = frame.as_object().and_then(locate_discriminator);

    let (name, payload) = match found {
        Some(found) => found,
        None => {
            debug!("Inbound frame has no discriminator");
            return unhandled(frame, message);
        }
    };

    if name.eq_ignore_ascii_case("error") {
        return SessionEvent::Error(ErrorEvent::server(payload));
    }

    match EventKind::from_discriminator(&name) {
        Some(kind) => SessionEvent::analytics(kind, payload),
        None => {
            debug!("Unrecognized event discriminator: {}", name);
            unhandled(frame, message)
        }
    }
}

fn unhandled(data: Value, message: &WsMessage) -> SessionEvent {
    SessionEvent::Unhandled {
        data,
        raw: message.to_text_lossy(),
    }
}

/// Discriminator and payload, nested framing first
fn locate_discriminator(object: &Map<String, Value>) -> Option<(String, Value)> {
    if let Some(event) = object.get("event").and_then(Value::as_object) {
        if let Some(name) = event.get("event_type").and_then(Value::as_str) {
            return Some((name.to_string(), payload_of(event)));
        }
    }

    ["type", "event_type"].iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .map(|name| (name.to_string(), payload_of(object)))
    })
}

fn payload_of(object: &Map<String, Value>) -> Value {
    object
        .get("data")
        .cloned()
        .unwrap_or_else(|| Value::Object(object.clone()))
}
