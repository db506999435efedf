use super::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::{events, participants, Id};

/// Fields of a new event. Every id in `participant_ids` is invited in the same write
/// that creates the event.
#[derive(Clone, Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub participant_ids: Vec<Id>,
}

/// A partial update. `None` leaves a field untouched. When `participant_ids` is set it
/// replaces the participant set: users already participating keep their status, new
/// users are invited and users not in the list are removed.
#[derive(Clone, Debug, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub participant_ids: Option<Vec<Id>>,
}

/// Paging and time-window filter for listing a user's events.
#[derive(Clone, Debug)]
pub struct EventFilter {
    pub skip: usize,
    pub limit: usize,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Snapshots taken on either side of a single update.
#[derive(Clone, Debug)]
pub struct EventUpdate {
    pub before: events::Model,
    pub after: events::Model,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            start_date: None,
            end_date: None,
        }
    }
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create_event(&self, creator_id: &Id, new_event: NewEvent)
        -> Result<events::Model, Error>;

    /// Fetches an event with its participants' identities.
    async fn find_event_by_id(&self, id: &Id) -> Result<Option<events::Model>, Error>;

    /// Events the user created or participates in, ordered by start time.
    async fn find_events_for_user(
        &self,
        user_id: &Id,
        filter: &EventFilter,
    ) -> Result<Vec<events::Model>, Error>;

    /// Applies `changes` and returns the snapshots immediately before and after the write.
    async fn update_event(&self, id: &Id, changes: EventChanges) -> Result<EventUpdate, Error>;

    /// Removes an event and all of its participation records. Returns the last snapshot
    /// of the removed event, or `None` when it did not exist.
    async fn delete_event(&self, id: &Id) -> Result<Option<events::Model>, Error>;

    /// Invites `user_id` to the event with status `invited`.
    async fn add_participant(
        &self,
        event_id: &Id,
        user_id: &Id,
    ) -> Result<participants::Model, Error>;

    async fn find_participation(
        &self,
        event_id: &Id,
        user_id: &Id,
    ) -> Result<Option<participants::Model>, Error>;

    /// Records a participant's response and stamps `responded_at`.
    async fn update_participation(
        &self,
        event_id: &Id,
        user_id: &Id,
        status: participants::Status,
    ) -> Result<participants::Model, Error>;
}
