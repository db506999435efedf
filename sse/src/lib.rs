//! Server-Sent Events (SSE) infrastructure for real-time calendar updates.
//!
//! # Architecture
//!
//! - **Single connection per user**: a second subscription from the same user replaces
//!   the first. The replaced stream ends on its own; its late teardown is ignored
//!   because removal is keyed by `ConnectionId`.
//! - **Bounded queues**: each connection gets a bounded channel. Publishing uses
//!   `try_send`, so a slow subscriber loses events instead of stalling the publisher.
//! - **Ephemeral messages**: if a user is offline they miss the event and see fresh
//!   data on their next read.
//! - **Snapshots, not deltas**: every message carries the full event as it stood after
//!   the change.
//!
//! # Message Flow
//!
//! 1. Client opens `GET /v1/sse/events` with a bearer access token
//! 2. `StreamHandler` registers the connection and yields a `connected` frame
//! 3. A mutation in the domain layer publishes a `DomainEvent` naming its recipients
//! 4. `SseDomainEventHandler` converts it and calls `Manager::publish`
//! 5. Each recipient's stream serializes the event and writes a `data:` frame
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry keyed by user with type-safe ConnectionId
//! - `manager`: fan-out, delivery accounting and shutdown
//! - `message`: wire event definitions
//! - `stream`: per-subscription loop and teardown guard
//! - `domain_event_handler`: bridge from `events::DomainEvent`

pub mod connection;
pub mod domain_event_handler;
pub mod manager;
pub mod message;
pub mod stream;

pub use domain_event_handler::SseDomainEventHandler;
pub use manager::{DeliveryReport, Manager};
pub use stream::StreamHandler;
