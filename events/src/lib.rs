//! Event system infrastructure for the calendar platform.
//!
//! This crate decouples domain logic from delivery concerns such as SSE notifications.
//!
//! # Architecture
//!
//! - **DomainEvent**: every calendar lifecycle change that users may be notified about
//! - **EventHandler**: trait for implementing event handlers
//! - **EventPublisher**: publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies. Event snapshots are carried as serialized JSON values.

use async_trait::async_trait;
use log::*;
use serde_json::Value;
use std::sync::Arc;

/// A type alias that represents any Entity's id.
/// This matches the definition in the entity crate to maintain compatibility.
pub type Id = String;

/// Domain events that represent business-level changes to calendar events.
/// These are emitted after the data-layer write has completed.
///
/// The domain layer decides who is interested in each change and records those users
/// in `notify_user_ids`. Handlers route on that list only, they never recompute it.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// An event's fields or participant set changed. Sent to the creator and every
    /// participant remaining after the change.
    EventUpdated {
        event_id: Id,
        /// Post-update event snapshot.
        event: Value,
        notify_user_ids: Vec<Id>,
    },
    /// Participants were invited, either at creation time or later. Sent to the creator
    /// and every participant after the invitation.
    EventInviteSent {
        event_id: Id,
        event: Value,
        notify_user_ids: Vec<Id>,
    },
    /// A participant accepted or declined. Sent to the creator and every participant.
    EventResponseUpdated {
        event_id: Id,
        event: Value,
        notify_user_ids: Vec<Id>,
    },
    /// The event is gone for the recipients: either it was deleted, or they were removed
    /// from its participant list.
    EventDeleted {
        event_id: Id,
        /// Last known snapshot of the event.
        event: Value,
        notify_user_ids: Vec<Id>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EventUpdated { .. } => "EventUpdated",
            DomainEvent::EventInviteSent { .. } => "EventInviteSent",
            DomainEvent::EventResponseUpdated { .. } => "EventResponseUpdated",
            DomainEvent::EventDeleted { .. } => "EventDeleted",
        }
    }

    pub fn notify_user_ids(&self) -> &[Id] {
        match self {
            DomainEvent::EventUpdated {
                notify_user_ids, ..
            }
            | DomainEvent::EventInviteSent {
                notify_user_ids, ..
            }
            | DomainEvent::EventResponseUpdated {
                notify_user_ids, ..
            }
            | DomainEvent::EventDeleted {
                notify_user_ids, ..
            } => notify_user_ids,
        }
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    /// Handlers must not fail the caller: a mutation that already succeeded is never
    /// reported as failed because a notification could not be delivered.
    pub async fn publish(&self, event: DomainEvent) {
        if event.notify_user_ids().is_empty() {
            trace!("Skipping {} with no recipients", event.name());
            return;
        }

        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
