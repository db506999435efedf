use crate::connection::{ConnectionId, ConnectionRegistry, UserId};
use crate::message::{Event, EventType};
use log::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of a single `publish`, one count per distinct recipient.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub not_connected: usize,
    /// Recipient's queue was full; the event was dropped for that recipient only.
    pub dropped: usize,
    /// Recipient's stream had already gone away; its registration was removed.
    pub closed: usize,
}

/// Routes events to connected users.
///
/// Publishing never blocks and never fails: every recipient is attempted, and a slow
/// or dead subscriber only affects its own delivery.
pub struct Manager {
    registry: Arc<ConnectionRegistry>,
    channel_capacity: usize,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_settings(channel_capacity: usize, poll_interval: Duration) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            // mpsc::channel panics on a zero capacity
            channel_capacity: channel_capacity.max(1),
            // A zero timeout never parks, so idle streams would spin
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.registry.contains(user_id)
    }

    /// Open a channel for `user_id`, replacing any connection they already had.
    pub fn register_connection(&self, user_id: UserId) -> (ConnectionId, Receiver<Arc<Event>>) {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let connection_id = self.registry.register(user_id.clone(), sender);
        info!(
            "Registered SSE connection {} for user {} ({} active)",
            connection_id.as_str(),
            user_id,
            self.registry.len()
        );
        (connection_id, receiver)
    }

    /// Remove the user's connection if it is still `connection_id`.
    pub fn unregister_connection(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let removed = self.registry.unregister(user_id, connection_id);
        if removed {
            info!(
                "Unregistered SSE connection {} for user {} ({} active)",
                connection_id.as_str(),
                user_id,
                self.registry.len()
            );
        }
        removed
    }

    /// Deliver `event` to each connected user in `user_ids`.
    ///
    /// Duplicate ids are delivered once. Users without a connection are skipped, since
    /// messages are not persisted for offline users.
    pub fn publish(&self, event: Event, user_ids: &[UserId]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if user_ids.is_empty() || self.registry.is_empty() {
            trace!("No connected recipients for {}", event.event_type());
            report.not_connected = user_ids.len();
            return report;
        }

        let event_type = event.event_type();
        let event = Arc::new(event);
        let recipients: BTreeSet<&UserId> = user_ids.iter().collect();

        for user_id in &recipients {
            let Some(connection) = self.registry.lookup(user_id) else {
                report.not_connected += 1;
                continue;
            };

            match connection.sender.try_send(Arc::clone(&event)) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "SSE queue full for user {}, dropping {} event",
                        user_id, event_type
                    );
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(
                        "SSE connection {} for user {} is closed, removing it",
                        connection.connection_id.as_str(),
                        user_id
                    );
                    self.registry.unregister(user_id, &connection.connection_id);
                    report.closed += 1;
                }
            }
        }

        info!(
            "Sent SSE {} event to {}/{} recipient(s)",
            event_type,
            report.delivered,
            recipients.len()
        );

        report
    }

    /// Signal every stream to stop and release all connections.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let closed = self.registry.close_all();
        info!("SSE manager shut down, closed {closed} connection(s)");
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use serde_json::json;

    fn updated() -> Event {
        Event::EventUpdated(json!({"id": "evt-1", "title": "Standup"}))
    }

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_publish_reaches_exactly_the_recipients() {
        let manager = Manager::new();
        let mut receivers: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| (id.to_string(), manager.register_connection(id.to_string()).1))
            .collect();

        let report = manager.publish(updated(), &users(&["a", "c"]));
        assert_eq!(report.delivered, 2);

        for (user, receiver) in receivers.iter_mut() {
            let got = receiver.try_recv();
            if user == "a" || user == "c" {
                assert_eq!(*got.unwrap(), updated());
            } else {
                assert!(got.is_err(), "{user} should not receive the event");
            }
        }
    }

    #[test]
    fn test_publish_counts_offline_users() {
        let manager = Manager::new();
        let (_id, _rx) = manager.register_connection("a".to_string());

        let report = manager.publish(updated(), &users(&["a", "offline"]));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.not_connected, 1);
    }

    #[test]
    fn test_publish_without_connections_is_a_no_op() {
        let manager = Manager::new();
        let report = manager.publish(updated(), &users(&["a", "b"]));
        assert_eq!(report.delivered, 0);
        assert_eq!(report.not_connected, 2);

        let report = manager.publish(updated(), &[]);
        assert_eq!(report, DeliveryReport::default());
    }

    #[test]
    fn test_publish_deduplicates_recipients() {
        let manager = Manager::new();
        let (_id, mut rx) = manager.register_connection("a".to_string());

        let report = manager.publish(updated(), &users(&["a", "a"]));

        assert_eq!(report.delivered, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dead_consumer_does_not_block_others() {
        let manager = Manager::new();
        let (_dead_id, dead_rx) = manager.register_connection("dead".to_string());
        let (_live_id, mut live_rx) = manager.register_connection("live".to_string());
        drop(dead_rx);

        let report = manager.publish(updated(), &users(&["dead", "live"]));

        assert_eq!(report.closed, 1);
        assert_eq!(report.delivered, 1);
        assert!(live_rx.try_recv().is_ok());
        assert!(!manager.is_connected(&"dead".to_string()));
        assert!(manager.is_connected(&"live".to_string()));
    }

    #[test]
    fn test_full_queue_drops_only_for_that_recipient() {
        let manager = Manager::with_settings(1, DEFAULT_POLL_INTERVAL);
        let (_slow_id, mut slow_rx) = manager.register_connection("slow".to_string());
        let (_fast_id, mut fast_rx) = manager.register_connection("fast".to_string());

        manager.publish(updated(), &users(&["slow"]));
        let report = manager.publish(updated(), &users(&["slow", "fast"]));

        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 1);
        assert!(fast_rx.try_recv().is_ok());
        // A full queue is not a dead connection.
        assert!(manager.is_connected(&"slow".to_string()));
        assert!(slow_rx.try_recv().is_ok());
        assert!(slow_rx.try_recv().is_err());
    }

    #[test]
    fn test_second_connection_supersedes_first() {
        let manager = Manager::new();
        let user = "a".to_string();
        let (first_id, mut first_rx) = manager.register_connection(user.clone());
        let (_second_id, mut second_rx) = manager.register_connection(user.clone());

        manager.publish(updated(), &[user.clone()]);

        assert!(second_rx.try_recv().is_ok());
        assert!(first_rx.try_recv().is_err());
        // Late teardown of the superseded stream leaves the new one alone.
        assert!(!manager.unregister_connection(&user, &first_id));
        assert!(manager.is_connected(&user));
    }

    #[derive(Default)]
    struct CapturedLogs(std::sync::Mutex<Vec<(Level, String)>>);

    impl Log for CapturedLogs {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.0
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn captured_logs() -> &'static CapturedLogs {
        static LOGS: std::sync::OnceLock<CapturedLogs> = std::sync::OnceLock::new();
        let logs = LOGS.get_or_init(CapturedLogs::default);
        if log::set_logger(logs).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
        logs
    }

    fn info_lines_mentioning(needle: &str) -> Vec<String> {
        captured_logs()
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, line)| *level == Level::Info && line.contains(needle))
            .map(|(_, line)| line.clone())
            .collect()
    }

    #[test]
    fn test_lifecycle_and_dispatch_are_logged_at_info_with_counts() {
        captured_logs();
        let manager = Manager::new();
        let user = "logged-user-7f3a".to_string();

        let (connection_id, _rx) = manager.register_connection(user.clone());
        manager.publish(updated(), &[user.clone(), "logged-offline-7f3a".to_string()]);
        manager.unregister_connection(&user, &connection_id);

        let lines = info_lines_mentioning(&user);
        assert!(lines
            .iter()
            .any(|line| line.starts_with("Registered") && line.contains("(1 active)")));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("Unregistered") && line.contains("(0 active)")));
        assert!(!info_lines_mentioning("to 1/2 recipient(s)").is_empty());
    }

    #[test]
    fn test_zero_settings_are_raised_to_the_minimum() {
        let manager = Manager::with_settings(0, Duration::ZERO);

        assert_eq!(manager.poll_interval(), Duration::from_millis(1));
        let (_id, _rx) = manager.register_connection("a".to_string());
        assert_eq!(manager.publish(updated(), &users(&["a"])).delivered, 1);
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let manager = Manager::new();
        let (_id, rx) = manager.register_connection("a".to_string());

        manager.shutdown();

        assert!(manager.is_shutting_down());
        assert_eq!(manager.connection_count(), 0);
        assert!(rx.is_closed());
    }
}
