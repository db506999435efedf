use crate::message::Event as SseEvent;
use crate::Manager;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by converting them to SSE messages and pushing them to the
/// affected users.
///
/// The domain layer determines which users should be notified and includes
/// their IDs in the event. This handler simply routes the SSE messages.
pub struct SseDomainEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseDomainEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }

    fn to_sse_event(event: &DomainEvent) -> SseEvent {
        match event {
            DomainEvent::EventUpdated { event, .. } => SseEvent::EventUpdated(event.clone()),
            DomainEvent::EventInviteSent { event, .. } => SseEvent::EventInviteSent(event.clone()),
            DomainEvent::EventResponseUpdated { event, .. } => {
                SseEvent::EventResponseUpdated(event.clone())
            }
            DomainEvent::EventDeleted { event, .. } => SseEvent::EventDeleted(event.clone()),
        }
    }
}

#[async_trait]
impl EventHandler for SseDomainEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling {} for {} user(s)", event.name(), event.notify_user_ids().len());

        let report = self
            .sse_manager
            .publish(Self::to_sse_event(event), event.notify_user_ids());

        if report.dropped > 0 || report.closed > 0 {
            warn!(
                "{} was not delivered to every connected user: {:?}",
                event.name(),
                report
            );
        }
    }
}
