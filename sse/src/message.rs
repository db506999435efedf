use serde::Serialize;
use serde_json::Value;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// A notification pushed to a subscriber. Serialized as one JSON frame,
/// `{"type": <event type>, "data": <event snapshot>}`, with `data` omitted for
/// `Connected`. Each message is self-contained: it carries a full snapshot, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Always the first frame on a new subscription.
    Connected,
    EventUpdated(Value),
    EventInviteSent(Value),
    EventResponseUpdated(Value),
    EventDeleted(Value),
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::EventUpdated(_) => "event_updated",
            Event::EventInviteSent(_) => "event_invite_sent",
            Event::EventResponseUpdated(_) => "event_response_updated",
            Event::EventDeleted(_) => "event_deleted",
        }
    }
}

impl Event {
    /// Renders the JSON frame written to the transport.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
