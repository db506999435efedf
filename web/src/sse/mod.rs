//! SSE HTTP handler for the web layer.
//!
//! The connection registry, dispatcher and stream loop live in the `sse` crate. This
//! module only adapts the stream to an axum response.

pub(crate) mod handler;
