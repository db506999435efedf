use crate::connection::{ConnectionId, UserId};
use crate::message::{Event, EventType};
use crate::Manager;
use async_stream::stream;
use futures::Stream;
use log::*;
use std::sync::Arc;
use tokio::time::timeout;

/// Lifecycle of one subscription, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opening,
    Streaming,
    Closing,
    Closed,
}

/// Unregisters the connection when the stream is dropped. Dropping covers every way a
/// subscription ends: the loop finishing, the peer disconnecting, and the server
/// dropping the response future.
struct ConnectionGuard {
    manager: Arc<Manager>,
    user_id: UserId,
    connection_id: ConnectionId,
    state: StreamState,
}

impl ConnectionGuard {
    fn transition(&mut self, state: StreamState) {
        trace!(
            "SSE connection {} {:?} -> {:?}",
            self.connection_id.as_str(),
            self.state,
            state
        );
        self.state = state;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.transition(StreamState::Closing);
        self.manager
            .unregister_connection(&self.user_id, &self.connection_id);
        self.transition(StreamState::Closed);
    }
}

/// Produces the outbound frames of one user's subscription.
pub struct StreamHandler {
    manager: Arc<Manager>,
    user_id: UserId,
}

impl StreamHandler {
    pub fn new(manager: Arc<Manager>, user_id: UserId) -> Self {
        Self { manager, user_id }
    }

    /// Registers the connection immediately and returns a stream of JSON frames.
    ///
    /// The first frame is always `connected`. After that each queued event is
    /// serialized and yielded in order. Between events the loop wakes every poll
    /// interval to check for shutdown. The stream ends when the manager shuts down,
    /// when a newer connection supersedes this one, or when a frame cannot be
    /// serialized.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        let (connection_id, mut receiver) = self.manager.register_connection(self.user_id.clone());
        let shutdown = self.manager.shutdown_token();
        let poll_interval = self.manager.poll_interval();

        let mut guard = ConnectionGuard {
            manager: self.manager,
            user_id: self.user_id,
            connection_id,
            state: StreamState::Opening,
        };

        stream! {
            match Event::Connected.to_frame() {
                Ok(frame) => yield frame,
                Err(e) => {
                    error!("Failed to serialize SSE connected frame: {e}");
                    return;
                }
            }
            guard.transition(StreamState::Streaming);

            loop {
                if shutdown.is_cancelled() {
                    debug!("SSE stream for user {} stopping for shutdown", guard.user_id);
                    break;
                }

                match timeout(poll_interval, receiver.recv()).await {
                    Ok(Some(event)) => match event.to_frame() {
                        Ok(frame) => yield frame,
                        Err(e) => {
                            error!(
                                "Failed to serialize SSE {} event for user {}: {e}",
                                event.event_type(),
                                guard.user_id
                            );
                            break;
                        }
                    },
                    Ok(None) => {
                        debug!(
                            "SSE channel for connection {} closed",
                            guard.connection_id.as_str()
                        );
                        break;
                    }
                    Err(_elapsed) => continue,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn manager() -> Arc<Manager> {
        Arc::new(Manager::with_settings(8, Duration::from_millis(20)))
    }

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn test_first_frame_is_connected() {
        let manager = manager();
        let stream = StreamHandler::new(manager.clone(), "alice".to_string()).into_stream();
        futures::pin_mut!(stream);

        let first = stream.next().await.unwrap();
        assert_eq!(parse(&first), json!({"type": "connected"}));
        assert!(manager.is_connected(&"alice".to_string()));
    }

    #[tokio::test]
    async fn test_relays_published_events_in_order() {
        let manager = manager();
        let stream = StreamHandler::new(manager.clone(), "alice".to_string()).into_stream();
        futures::pin_mut!(stream);
        stream.next().await.unwrap();

        let recipients = vec!["alice".to_string()];
        manager.publish(Event::EventUpdated(json!({"id": "1"})), &recipients);
        manager.publish(Event::EventDeleted(json!({"id": "2"})), &recipients);

        let first = parse(&stream.next().await.unwrap());
        let second = parse(&stream.next().await.unwrap());
        assert_eq!(first["type"], "event_updated");
        assert_eq!(second["type"], "event_deleted");
        assert_eq!(second["data"]["id"], "2");
    }

    #[tokio::test]
    async fn test_dropping_stream_unregisters() {
        let manager = manager();
        let stream = StreamHandler::new(manager.clone(), "alice".to_string()).into_stream();
        assert_eq!(manager.connection_count(), 1);

        drop(stream);

        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let manager = manager();
        let stream = StreamHandler::new(manager.clone(), "alice".to_string()).into_stream();
        futures::pin_mut!(stream);
        stream.next().await.unwrap();

        manager.shutdown();

        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_superseded_stream_ends_without_evicting_successor() {
        let manager = manager();
        let user = "alice".to_string();

        let old = StreamHandler::new(manager.clone(), user.clone()).into_stream();
        futures::pin_mut!(old);
        old.next().await.unwrap();

        let new = StreamHandler::new(manager.clone(), user.clone()).into_stream();
        futures::pin_mut!(new);
        new.next().await.unwrap();

        let ended = tokio::time::timeout(Duration::from_secs(1), old.next())
            .await
            .unwrap();
        assert!(ended.is_none());

        // The old stream's teardown ran; the new registration survives it.
        assert!(manager.is_connected(&user));
        let report = manager.publish(Event::EventUpdated(json!({"id": "1"})), &[user]);
        assert_eq!(report.delivered, 1);
        assert_eq!(parse(&new.next().await.unwrap())["type"], "event_updated");
    }
}
