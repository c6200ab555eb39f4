//! Outbound mail transport glue.
//!
//! Assembles the provider-shaped send payload from an [`OutgoingEmail`] and
//! hands it to a [`PostRunClient`]. The client itself (HTTP, auth, retries)
//! is the host's concern; this module only defines the seam it must fill.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// An email address with an optional display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub email: String,
    pub name: Option<String>,
}

impl Address {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "email": self.email,
            "name": self.name.clone().unwrap_or_default(),
        })
    }
}

/// A file attachment. `content` is raw bytes; it is base64-encoded in the
/// wire payload.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub mime_type: String,
}

/// An in-flight message, ready for payload assembly. PostRun addresses a
/// single recipient per message.
#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail {
    pub to: Option<Address>,
    pub from: Option<Address>,
    pub reply_to: Option<Address>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
}

/// Assemble the provider-shaped JSON payload for one message. Optional
/// sections are omitted entirely when empty.
pub fn build_payload(email: &OutgoingEmail) -> Value {
    let mut payload = Map::new();
    payload.insert("subject".to_string(), json!(email.subject));

    if let Some(to) = &email.to {
        payload.insert("to".to_string(), to.to_value());
    }
    if let Some(from) = &email.from {
        payload.insert("from".to_string(), from.to_value());
    }
    if let Some(reply_to) = &email.reply_to {
        payload.insert("reply_to".to_string(), reply_to.to_value());
    }

    if let Some(html) = &email.html {
        payload.insert("html".to_string(), json!(html));
    }
    if let Some(text) = &email.text {
        payload.insert("text".to_string(), json!(text));
    }

    if !email.attachments.is_empty() {
        let attachments: Vec<Value> = email
            .attachments
            .iter()
            .map(|a| {
                json!({
                    "filename": a.filename,
                    "content": base64::engine::general_purpose::STANDARD.encode(&a.content),
                    "mime_type": a.mime_type,
                })
            })
            .collect();
        payload.insert("attachments".to_string(), Value::Array(attachments));
    }

    if !email.tags.is_empty() {
        payload.insert("tags".to_string(), json!(email.tags));
    }
    if !email.metadata.is_empty() {
        payload.insert("meta".to_string(), Value::Object(email.metadata.clone()));
    }

    Value::Object(payload)
}

/// Merge the three tag tiers: base-level, per-message, runtime override.
/// Later tiers win; duplicates keep their first position.
pub fn merge_tags(base: &[String], message: &[String], runtime: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for tag in base.iter().chain(message).chain(runtime) {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Merge the three metadata tiers with the same override order (base <
/// per-message < runtime); later tiers overwrite the same key.
pub fn merge_metadata(
    base: &Map<String, Value>,
    message: &Map<String, Value>,
    runtime: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = base.clone();
    for (k, v) in message.iter().chain(runtime) {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Why an outbound send failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The provider answered with a non-2xx status.
    #[error("PostRun API error (status {status}): {message}")]
    Api { status: u16, message: String },
    /// The request never produced a provider response.
    #[error("PostRun request failed: {0}")]
    Request(String),
}

/// Successful send acknowledgment from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub message_id: String,
}

/// The provider send API, as this crate needs it.
#[async_trait]
pub trait PostRunClient: Send + Sync {
    async fn send(&self, payload: &Value) -> Result<SendResponse, TransportError>;
}

/// Glue between an in-flight message and the provider client: builds the
/// payload, sends it, returns the provider's message id.
pub struct PostRunTransport<C> {
    client: C,
}

impl<C: PostRunClient> PostRunTransport<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<String, TransportError> {
        let payload = build_payload(email);
        let response = self.client.send(&payload).await?;
        Ok(response.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn maplit(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn payload_includes_only_present_sections() {
        let email = OutgoingEmail {
            subject: "Hi".to_string(),
            ..Default::default()
        };
        let payload = build_payload(&email);
        assert_eq!(payload["subject"], json!("Hi"));
        for key in ["to", "from", "reply_to", "html", "text", "attachments", "tags", "meta"] {
            assert!(payload.get(key).is_none(), "{key} should be omitted");
        }
    }

    #[test]
    fn payload_full_shape() {
        let email = OutgoingEmail {
            to: Some(Address::named("a@b.com", "Alice")),
            from: Some(Address::new("noreply@example.com")),
            reply_to: Some(Address::new("support@example.com")),
            subject: "Welcome".to_string(),
            html: Some("<p>Hi</p>".to_string()),
            text: Some("Hi".to_string()),
            attachments: vec![Attachment {
                filename: "hello.txt".to_string(),
                content: b"hello".to_vec(),
                mime_type: "text/plain".to_string(),
            }],
            tags: vec!["welcome".to_string()],
            metadata: maplit(&[("user_id", json!(123))]),
        };

        let payload = build_payload(&email);
        assert_eq!(payload["to"], json!({"email": "a@b.com", "name": "Alice"}));
        // absent display name serializes as an empty string
        assert_eq!(payload["from"], json!({"email": "noreply@example.com", "name": ""}));
        assert_eq!(payload["reply_to"]["email"], json!("support@example.com"));
        assert_eq!(payload["html"], json!("<p>Hi</p>"));
        assert_eq!(payload["text"], json!("Hi"));
        assert_eq!(
            payload["attachments"],
            json!([{"filename": "hello.txt", "content": "aGVsbG8=", "mime_type": "text/plain"}])
        );
        assert_eq!(payload["tags"], json!(["welcome"]));
        assert_eq!(payload["meta"], json!({"user_id": 123}));
    }

    #[test]
    fn tag_merge_order_and_dedup() {
        let base = vec!["newsletter".to_string(), "bulk".to_string()];
        let message = vec!["welcome".to_string(), "bulk".to_string()];
        let runtime = vec!["ab-test".to_string()];
        assert_eq!(
            merge_tags(&base, &message, &runtime),
            vec!["newsletter", "bulk", "welcome", "ab-test"]
        );
        assert!(merge_tags(&[], &[], &[]).is_empty());
    }

    #[test]
    fn metadata_merge_later_tiers_override() {
        let base = maplit(&[("env", json!("prod")), ("team", json!("growth"))]);
        let message = maplit(&[("user_id", json!(1)), ("team", json!("onboarding"))]);
        let runtime = maplit(&[("user_id", json!(2))]);

        let merged = merge_metadata(&base, &message, &runtime);
        assert_eq!(merged["env"], json!("prod"));
        assert_eq!(merged["team"], json!("onboarding"));
        assert_eq!(merged["user_id"], json!(2));
        assert_eq!(merged.len(), 3);
    }

    struct MockClient {
        sent: Mutex<Vec<Value>>,
        response: Result<String, (u16, String)>,
    }

    #[async_trait]
    impl PostRunClient for MockClient {
        async fn send(&self, payload: &Value) -> Result<SendResponse, TransportError> {
            self.sent.lock().unwrap().push(payload.clone());
            match &self.response {
                Ok(id) => Ok(SendResponse {
                    message_id: id.clone(),
                }),
                Err((status, message)) => Err(TransportError::Api {
                    status: *status,
                    message: message.clone(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn transport_returns_provider_message_id() {
        let client = MockClient {
            sent: Mutex::new(Vec::new()),
            response: Ok("msg_42".to_string()),
        };
        let transport = PostRunTransport::new(client);

        let email = OutgoingEmail {
            to: Some(Address::new("a@b.com")),
            subject: "Hi".to_string(),
            ..Default::default()
        };
        let message_id = transport.send(&email).await.unwrap();
        assert_eq!(message_id, "msg_42");

        let sent = transport.client.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["subject"], json!("Hi"));
    }

    #[tokio::test]
    async fn transport_propagates_api_errors() {
        let client = MockClient {
            sent: Mutex::new(Vec::new()),
            response: Err((422, "invalid recipient".to_string())),
        };
        let transport = PostRunTransport::new(client);

        let err = transport
            .send(&OutgoingEmail::default())
            .await
            .unwrap_err();
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "invalid recipient");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
