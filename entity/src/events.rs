use crate::{participants, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// A calendar event together with the identities of its participants. This is the
/// snapshot returned by the API and carried as the payload of notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = events::Model)]
pub struct Model {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub creator_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub participants: Vec<participants::Model>,
}

impl Model {
    pub fn participant_ids(&self) -> BTreeSet<Id> {
        self.participants
            .iter()
            .map(|participant| participant.user.id.clone())
            .collect()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants
            .iter()
            .any(|participant| participant.user.id == user_id)
    }

    /// The creator plus every current participant.
    pub fn interested_user_ids(&self) -> BTreeSet<Id> {
        let mut ids = self.participant_ids();
        ids.insert(self.creator_id.clone());
        ids
    }

    /// Whether `user_id` may read this event.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        self.creator_id == user_id || self.is_participant(user_id)
    }
}
