//! Typed PostRun webhook events.
//!
//! Every verified delivery produces a generic [`WebhookReceived`] event, and
//! recognized event types additionally produce one of the typed lifecycle
//! events below. All field extraction is defensive: a missing or misshapen
//! key yields an empty/None value, never an error, so a payload the provider
//! extends later still constructs cleanly.

use serde::Serialize;
use serde_json::{Map, Value};

/// The fixed set of PostRun lifecycle event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    #[serde(rename = "message.sent")]
    Sent,
    #[serde(rename = "message.delivered")]
    Delivered,
    #[serde(rename = "message.bounced")]
    Bounced,
    #[serde(rename = "message.complained")]
    Complained,
    #[serde(rename = "message.rejected")]
    Rejected,
    #[serde(rename = "message.opened")]
    Opened,
    #[serde(rename = "message.clicked")]
    Clicked,
}

impl EventType {
    /// Parse from the `X-PostRun-Event` header form (e.g. `"message.bounced"`).
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "message.sent" => Some(Self::Sent),
            "message.delivered" => Some(Self::Delivered),
            "message.bounced" => Some(Self::Bounced),
            "message.complained" => Some(Self::Complained),
            "message.rejected" => Some(Self::Rejected),
            "message.opened" => Some(Self::Opened),
            "message.clicked" => Some(Self::Clicked),
            _ => None,
        }
    }

    /// Convert to the dot-separated string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "message.sent",
            Self::Delivered => "message.delivered",
            Self::Bounced => "message.bounced",
            Self::Complained => "message.complained",
            Self::Rejected => "message.rejected",
            Self::Opened => "message.opened",
            Self::Clicked => "message.clicked",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every typed event, extracted from the payload's
/// `message` object.
#[derive(Debug, Clone, Serialize)]
pub struct MessageInfo {
    pub message_id: String,
    pub email: String,
    pub name: Option<String>,
    pub subject: String,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    /// The full original payload, preserved for forward compatibility.
    pub raw_payload: Value,
}

impl MessageInfo {
    pub fn from_payload(payload: &Value) -> Self {
        let message = sub_object(payload, "message");
        Self {
            message_id: str_field(message, "id"),
            email: str_field(message, "to_email"),
            name: opt_str_field(message, "to_name"),
            subject: str_field(message, "subject"),
            tags: tags_field(message),
            metadata: map_field(message, "metadata"),
            raw_payload: payload.clone(),
        }
    }
}

/// Generic catch-all event, emitted for every verified delivery regardless
/// of whether the declared event type is recognized.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceived {
    pub payload: Value,
    /// The raw `X-PostRun-Event` value, unchanged (empty if absent).
    pub event_type: String,
}

impl WebhookReceived {
    /// The payload's `message` object (empty if absent or misshapen).
    pub fn message(&self) -> Map<String, Value> {
        sub_object(&self.payload, "message").cloned().unwrap_or_default()
    }

    /// The payload's `event_data` object (empty if absent or misshapen).
    pub fn event_data(&self) -> Map<String, Value> {
        sub_object(&self.payload, "event_data").cloned().unwrap_or_default()
    }
}

/// The email was accepted by the mail server.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSent {
    #[serde(flatten)]
    pub message: MessageInfo,
}

impl MessageSent {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            message: MessageInfo::from_payload(payload),
        }
    }
}

/// The email reached the recipient's mail server.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDelivered {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub delivered_at: Option<String>,
}

impl MessageDelivered {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            delivered_at: opt_str_field(event_data, "delivered_at"),
        }
    }
}

/// The email bounced.
#[derive(Debug, Clone, Serialize)]
pub struct MessageBounced {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub bounce_type: String,
    pub bounce_subtype: Option<String>,
    pub diagnostic_code: Option<String>,
}

impl MessageBounced {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            bounce_type: opt_str_field(event_data, "bounce_type")
                .unwrap_or_else(|| "Unknown".to_string()),
            bounce_subtype: opt_str_field(event_data, "bounce_subtype"),
            diagnostic_code: opt_str_field(event_data, "diagnostic_code"),
        }
    }

    /// Permanent bounces mean the address is invalid; do not retry it.
    pub fn is_permanent(&self) -> bool {
        self.bounce_type == "Permanent"
    }

    /// Transient bounces may succeed on retry.
    pub fn is_temporary(&self) -> bool {
        self.bounce_type == "Transient"
    }
}

/// The recipient marked the email as spam. Stop sending to this address.
#[derive(Debug, Clone, Serialize)]
pub struct MessageComplained {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub complaint_type: Option<String>,
}

impl MessageComplained {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            complaint_type: opt_str_field(event_data, "complaint_type"),
        }
    }
}

/// The email was rejected before sending.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRejected {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub reason: Option<String>,
}

impl MessageRejected {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            reason: opt_str_field(event_data, "reason"),
        }
    }
}

/// The recipient opened the email.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOpened {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub user_agent: Option<String>,
}

impl MessageOpened {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            user_agent: opt_str_field(event_data, "user_agent"),
        }
    }
}

/// The recipient clicked a link in the email.
#[derive(Debug, Clone, Serialize)]
pub struct MessageClicked {
    #[serde(flatten)]
    pub message: MessageInfo,
    pub link: Option<String>,
    pub user_agent: Option<String>,
}

impl MessageClicked {
    pub fn from_payload(payload: &Value) -> Self {
        let event_data = sub_object(payload, "event_data");
        Self {
            message: MessageInfo::from_payload(payload),
            link: opt_str_field(event_data, "link"),
            user_agent: opt_str_field(event_data, "user_agent"),
        }
    }
}

/// Sum of everything the dispatcher can publish.
#[derive(Debug, Clone, Serialize)]
pub enum PostRunEvent {
    Received(WebhookReceived),
    Sent(MessageSent),
    Delivered(MessageDelivered),
    Bounced(MessageBounced),
    Complained(MessageComplained),
    Rejected(MessageRejected),
    Opened(MessageOpened),
    Clicked(MessageClicked),
}

impl PostRunEvent {
    /// Short name of the variant, for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Received(_) => "received",
            Self::Sent(_) => "sent",
            Self::Delivered(_) => "delivered",
            Self::Bounced(_) => "bounced",
            Self::Complained(_) => "complained",
            Self::Rejected(_) => "rejected",
            Self::Opened(_) => "opened",
            Self::Clicked(_) => "clicked",
        }
    }
}

// ─── Extraction helpers ──────────────────────────────────────────────────────

fn sub_object<'a>(payload: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    payload.get(key).and_then(Value::as_object)
}

fn str_field(obj: Option<&Map<String, Value>>, key: &str) -> String {
    opt_str_field(obj, key).unwrap_or_default()
}

fn opt_str_field(obj: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    obj.and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn tags_field(obj: Option<&Map<String, Value>>) -> Vec<String> {
    obj.and_then(|m| m.get("tags"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn map_field(obj: Option<&Map<String, Value>>, key: &str) -> Map<String, Value> {
    obj.and_then(|m| m.get(key))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
