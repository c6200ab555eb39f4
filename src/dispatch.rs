//! Event dispatch for verified webhook payloads.
//!
//! Every verified delivery yields a generic [`WebhookReceived`] event; a
//! recognized event type yields the matching typed event as well, in that
//! order. Unrecognized types are not an error: the generic event still
//! flows, so catch-all consumers keep working when the provider adds types.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::{
    EventType, MessageBounced, MessageClicked, MessageComplained, MessageDelivered,
    MessageOpened, MessageRejected, MessageSent, PostRunEvent, WebhookReceived,
};

/// Sending half of the in-process event bus.
pub type EventSender = mpsc::UnboundedSender<PostRunEvent>;

/// Receiving half, owned by the host application.
pub type EventReceiver = mpsc::UnboundedReceiver<PostRunEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Build the events for one verified payload: the generic event first, then
/// the typed variant when `event_type` is recognized. Pure, stateless.
pub fn build_events(event_type: Option<&str>, payload: &Value) -> Vec<PostRunEvent> {
    let raw_type = event_type.unwrap_or("");

    let mut events = vec![PostRunEvent::Received(WebhookReceived {
        payload: payload.clone(),
        event_type: raw_type.to_string(),
    })];

    match EventType::parse_str(raw_type) {
        Some(EventType::Sent) => {
            events.push(PostRunEvent::Sent(MessageSent::from_payload(payload)));
        }
        Some(EventType::Delivered) => {
            events.push(PostRunEvent::Delivered(MessageDelivered::from_payload(payload)));
        }
        Some(EventType::Bounced) => {
            events.push(PostRunEvent::Bounced(MessageBounced::from_payload(payload)));
        }
        Some(EventType::Complained) => {
            events.push(PostRunEvent::Complained(MessageComplained::from_payload(payload)));
        }
        Some(EventType::Rejected) => {
            events.push(PostRunEvent::Rejected(MessageRejected::from_payload(payload)));
        }
        Some(EventType::Opened) => {
            events.push(PostRunEvent::Opened(MessageOpened::from_payload(payload)));
        }
        Some(EventType::Clicked) => {
            events.push(PostRunEvent::Clicked(MessageClicked::from_payload(payload)));
        }
        None => {
            warn!(
                event_type = %raw_type,
                "unrecognized PostRun event type, publishing generic event only"
            );
        }
    }

    events
}

/// Publish the events for a verified payload.
///
/// Send failures mean the receiving side is gone; they are absorbed rather
/// than surfaced, so the provider never sees a non-2xx for an
/// application-side handling issue.
pub fn dispatch(event_type: Option<&str>, payload: &Value, tx: &EventSender) {
    for event in build_events(event_type, payload) {
        let kind = event.kind();
        if tx.send(event).is_err() {
            debug!(kind, "event bus receiver dropped, discarding event");
        } else {
            debug!(kind, "published webhook event");
        }
    }
}
