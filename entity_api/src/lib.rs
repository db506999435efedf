//! The data-access layer. Everything above this crate reads and writes users and events
//! through the [`UserRepository`] and [`EventRepository`] traits, so the backing store can
//! be swapped without touching domain logic. [`memory::MemoryDatabase`] is the in-process
//! implementation used by the server binary and by tests.

pub use entity::{events, jwt, new_id, participants, users, Id};

pub mod error;
pub mod event;
pub mod memory;
pub mod user;

pub use event::{EventChanges, EventFilter, EventRepository, EventUpdate, NewEvent};
pub use memory::MemoryDatabase;
pub use user::{NewUser, UserRepository};

/// A complete data layer: both repositories behind one handle.
pub trait Database: UserRepository + EventRepository + Send + Sync {}

impl<T> Database for T where T: UserRepository + EventRepository + Send + Sync {}
