//! Event taxonomy shared by the codec and the dispatcher
//!
//! One closed set of kinds. Lifecycle kinds describe the socket; analytics
//! kinds carry server payloads the session forwards without interpreting.

use serde_json::Value;
use std::fmt;

/// Every kind of event a session can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Open,
    Close,
    Error,
    SpeakerChange,
    ActionItem,
    Question,
    Interruption,
    SentimentChange,
    KeyPhrase,
    Silence,
    MetricsUpdate,
    Unhandled,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Open,
        EventKind::Close,
        EventKind::Error,
        EventKind::SpeakerChange,
        EventKind::ActionItem,
        EventKind::Question,
        EventKind::Interruption,
        EventKind::SentimentChange,
        EventKind::KeyPhrase,
        EventKind::Silence,
        EventKind::MetricsUpdate,
        EventKind::Unhandled,
    ];

    /// Canonical wire name (`speaker_change`, `metrics_update`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Error => "error",
            EventKind::SpeakerChange => "speaker_change",
            EventKind::ActionItem => "action_item",
            EventKind::Question => "question",
            EventKind::Interruption => "interruption",
            EventKind::SentimentChange => "sentiment_change",
            EventKind::KeyPhrase => "key_phrase",
            EventKind::Silence => "silence",
            EventKind::MetricsUpdate => "metrics_update",
            EventKind::Unhandled => "unhandled",
        }
    }

    /// Open, Close and Error
    pub fn is_lifecycle(self) -> bool {
        matches!(self, EventKind::Open | EventKind::Close | EventKind::Error)
    }

    /// Analytics kind named by a server discriminator
    ///
    /// Matching ignores ASCII case, `_` and `-`, so `speaker_change`,
    /// `SpeakerChange` and `speaker-change` are the same kind. Lifecycle
    /// names never match; `Unhandled` is not a server name either.
    pub fn from_discriminator(name: &str) -> Option<EventKind> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let kind = match normalized.as_str() {
            "speakerchange" => EventKind::SpeakerChange,
            "actionitem" => EventKind::ActionItem,
            "question" => EventKind::Question,
            "interruption" => EventKind::Interruption,
            "sentimentchange" => EventKind::SentimentChange,
            "keyphrase" => EventKind::KeyPhrase,
            "silence" => EventKind::Silence,
            "metricsupdate" | "metrics" => EventKind::MetricsUpdate,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of an `Error` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inbound frame was not valid JSON; session unaffected
    Parse,
    /// Socket failure; session is `Failed`
    Transport,
    /// Server reported an error in-band; session unaffected
    Server,
    /// Caller force-terminated the session; session is `Failed`
    Aborted,
}

impl ErrorKind {
    /// Whether this error ended the session
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Aborted)
    }
}

/// Payload of an `Error` event
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    /// Undecodable frame text, for `Parse`
    pub raw: Option<String>,
    /// Server payload, for `Server`
    pub data: Option<Value>,
}

impl ErrorEvent {
    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            message: message.into(),
            raw: Some(raw.into()),
            data: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
            raw: None,
            data: None,
        }
    }

    pub fn server(data: Value) -> Self {
        let message = data
            .get("message")
            .or_else(|| data.get("description"))
            .and_then(Value::as_str)
            .unwrap_or("server reported an error")
            .to_string();
        Self {
            kind: ErrorKind::Server,
            message,
            raw: None,
            data: Some(data),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Aborted,
            message: message.into(),
            raw: None,
            data: None,
        }
    }
}

/// One event delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Open,
    Close { code: u16, reason: String },
    Error(ErrorEvent),
    SpeakerChange(Value),
    ActionItem(Value),
    Question(Value),
    Interruption(Value),
    SentimentChange(Value),
    KeyPhrase(Value),
    Silence(Value),
    MetricsUpdate(Value),
    /// Frame with a missing or unknown discriminator
    ///
    /// `raw` is the frame text exactly as received; `data` is its parsed form.
    Unhandled { data: Value, raw: String },
}

impl SessionEvent {
    /// Build an analytics event of `kind` around `data`
    ///
    /// Lifecycle kinds cannot carry analytics data and fall back to
    /// `Unhandled`, with `data` rendered as its `raw` text.
    pub fn analytics(kind: EventKind, data: Value) -> Self {
        match kind {
            EventKind::SpeakerChange => SessionEvent::SpeakerChange(data),
            EventKind::ActionItem => SessionEvent::ActionItem(data),
            EventKind::Question => SessionEvent::Question(data),
            EventKind::Interruption => SessionEvent::Interruption(data),
            EventKind::SentimentChange => SessionEvent::SentimentChange(data),
            EventKind::KeyPhrase => SessionEvent::KeyPhrase(data),
            EventKind::Silence => SessionEvent::Silence(data),
            EventKind::MetricsUpdate => SessionEvent::MetricsUpdate(data),
            EventKind::Open | EventKind::Close | EventKind::Error | EventKind::Unhandled => {
                let raw = data.to_string();
                SessionEvent::Unhandled { data, raw }
            }
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Open => EventKind::Open,
            SessionEvent::Close { .. } => EventKind::Close,
            SessionEvent::Error(_) => EventKind::Error,
            SessionEvent::SpeakerChange(_) => EventKind::SpeakerChange,
            SessionEvent::ActionItem(_) => EventKind::ActionItem,
            SessionEvent::Question(_) => EventKind::Question,
            SessionEvent::Interruption(_) => EventKind::Interruption,
            SessionEvent::SentimentChange(_) => EventKind::SentimentChange,
            SessionEvent::KeyPhrase(_) => EventKind::KeyPhrase,
            SessionEvent::Silence(_) => EventKind::Silence,
            SessionEvent::MetricsUpdate(_) => EventKind::MetricsUpdate,
            SessionEvent::Unhandled { .. } => EventKind::Unhandled,
        }
    }

    /// Analytics or unhandled payload, if any
    pub fn data(&self) -> Option<&Value> {
        match self {
            SessionEvent::SpeakerChange(v)
            | SessionEvent::ActionItem(v)
            | SessionEvent::Question(v)
            | SessionEvent::Interruption(v)
            | SessionEvent::SentimentChange(v)
            | SessionEvent::KeyPhrase(v)
            | SessionEvent::Silence(v)
            | SessionEvent::MetricsUpdate(v)
            | SessionEvent::Unhandled { data: v, .. } => Some(v),
            SessionEvent::Error(e) => e.data.as_ref(),
            SessionEvent::Open | SessionEvent::Close { .. } => None,
        }
    }

    /// Received text of an `Unhandled` frame
    pub fn raw(&self) -> Option<&str> {
        match self {
            SessionEvent::Unhandled { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            SessionEvent::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Close, or an error that ended the session
    pub fn is_terminal(&self) -> bool {
        match self {
            SessionEvent::Close { .. } => true,
            SessionEvent::Error(e) => e.kind.is_fatal(),
            _ => false,
        }
    }
}
