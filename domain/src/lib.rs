//! This module re-exports various items from the `entity_api` crate.
//!
//! The purpose of this re-export is to ensure that consumers of the `domain` crate do not need to
//! directly depend on the `entity_api` crate. By re-exporting these items, `web` works with models,
//! the `Database` handle and query filters through the domain layer, while the underlying
//! implementation details remain in the `entity_api` crate.
pub use entity_api::{
    events, participants, users, Database, EventFilter, Id, MemoryDatabase,
};

pub mod error;
pub mod event;
pub mod jwt;
pub mod refresh_token_store;
pub mod session;
pub mod user;

pub use session::SessionManager;
