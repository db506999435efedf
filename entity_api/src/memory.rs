//! In-process implementation of the data layer.
//!
//! All tables live behind a single `RwLock`, so every repository call is atomic with
//! respect to every other call. Snapshots are assembled on read by joining participation
//! rows with the users table, the same shape a relational backend would return.
use crate::error::{EntityApiErrorKind, Error};
use crate::event::{EventChanges, EventFilter, EventRepository, EventUpdate, NewEvent};
use crate::user::{generate_hash, NewUser, UserRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::users::UserInfo;
use entity::{events, new_id, participants, users, Id};
use log::*;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct EventRow {
    id: Id,
    title: String,
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    location: Option<String>,
    creator_id: Id,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    // Kept in invitation order.
    participants: Vec<ParticipationRow>,
}

#[derive(Clone, Debug)]
struct ParticipationRow {
    user_id: Id,
    status: participants::Status,
    invited_at: DateTime<Utc>,
    responded_at: Option<DateTime<Utc>>,
}

impl ParticipationRow {
    fn invited(user_id: Id) -> Self {
        Self {
            user_id,
            status: participants::Status::Invited,
            invited_at: Utc::now(),
            responded_at: None,
        }
    }
}

#[derive(Default)]
struct Tables {
    users: HashMap<Id, users::Model>,
    events: HashMap<Id, EventRow>,
}

impl Tables {
    fn user_info(&self, user_id: &Id) -> Result<UserInfo, Error> {
        self.users
            .get(user_id)
            .map(UserInfo::from)
            .ok_or_else(|| Error::new(EntityApiErrorKind::RecordNotFound))
    }

    fn participant(&self, row: &ParticipationRow) -> Result<participants::Model, Error> {
        Ok(participants::Model {
            user: self.user_info(&row.user_id)?,
            status: row.status,
            invited_at: row.invited_at,
            responded_at: row.responded_at,
        })
    }

    fn snapshot(&self, row: &EventRow) -> Result<events::Model, Error> {
        let participants = row
            .participants
            .iter()
            .map(|participant| self.participant(participant))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events::Model {
            id: row.id.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location.clone(),
            creator_id: row.creator_id.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            participants,
        })
    }

    fn event_row_mut(&mut self, id: &Id) -> Result<&mut EventRow, Error> {
        self.events
            .get_mut(id)
            .ok_or_else(|| Error::new(EntityApiErrorKind::RecordNotFound))
    }
}

#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn create_user(&self, new_user: NewUser) -> Result<users::Model, Error> {
        // Hash before taking the lock, hashing is slow.
        let password = generate_hash(new_user.password);

        let mut tables = self.tables.write().await;
        let taken = tables.users.values().any(|user| {
            user.email.eq_ignore_ascii_case(&new_user.email) || user.username == new_user.username
        });
        if taken {
            debug!(
                "User with email {} or username {} already exists",
                new_user.email, new_user.username
            );
            return Err(Error::new(EntityApiErrorKind::RecordAlreadyExists));
        }

        let user = users::Model {
            id: new_id(),
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: &Id) -> Result<Option<users::Model>, Error> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<users::Model>, Error> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_user_active(&self, id: &Id, is_active: bool) -> Result<users::Model, Error> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(id)
            .ok_or_else(|| Error::new(EntityApiErrorKind::RecordNotFound))?;
        user.is_active = is_active;
        user.updated_at = Some(Utc::now());
        Ok(user.clone())
    }
}

#[async_trait]
impl EventRepository for MemoryDatabase {
    async fn create_event(
        &self,
        creator_id: &Id,
        new_event: NewEvent,
    ) -> Result<events::Model, Error> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(creator_id) {
            return Err(Error::new(EntityApiErrorKind::RecordNotFound));
        }
        if let Some(unknown) = new_event
            .participant_ids
            .iter()
            .find(|user_id| !tables.users.contains_key(*user_id))
        {
            warn!("Cannot invite unknown user {unknown} to a new event");
            return Err(Error::new(EntityApiErrorKind::RecordNotFound));
        }

        let mut participants: Vec<ParticipationRow> = Vec::new();
        for user_id in new_event.participant_ids {
            if &user_id != creator_id && !participants.iter().any(|p| p.user_id == user_id) {
                participants.push(ParticipationRow::invited(user_id));
            }
        }

        let row = EventRow {
            id: new_id(),
            title: new_event.title,
            description: new_event.description,
            start_time: new_event.start_time,
            end_time: new_event.end_time,
            location: new_event.location,
            creator_id: creator_id.clone(),
            created_at: Utc::now(),
            updated_at: None,
            participants,
        };
        let snapshot = tables.snapshot(&row)?;
        tables.events.insert(row.id.clone(), row);

        Ok(snapshot)
    }

    async fn find_event_by_id(&self, id: &Id) -> Result<Option<events::Model>, Error> {
        let tables = self.tables.read().await;
        tables
            .events
            .get(id)
            .map(|row| tables.snapshot(row))
            .transpose()
    }

    async fn find_events_for_user(
        &self,
        user_id: &Id,
        filter: &EventFilter,
    ) -> Result<Vec<events::Model>, Error> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&EventRow> = tables
            .events
            .values()
            .filter(|row| {
                &row.creator_id == user_id
                    || row.participants.iter().any(|p| &p.user_id == user_id)
            })
            .filter(|row| filter.start_date.map_or(true, |start| row.start_time >= start))
            .filter(|row| filter.end_date.map_or(true, |end| row.end_time <= end))
            .collect();
        rows.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        rows.into_iter()
            .skip(filter.skip)
            .take(filter.limit)
            .map(|row| tables.snapshot(row))
            .collect()
    }

    async fn update_event(&self, id: &Id, changes: EventChanges) -> Result<EventUpdate, Error> {
        let mut tables = self.tables.write().await;

        if let Some(participant_ids) = &changes.participant_ids {
            if let Some(unknown) = participant_ids
                .iter()
                .find(|user_id| !tables.users.contains_key(*user_id))
            {
                warn!("Cannot add unknown user {unknown} to event {id}");
                return Err(Error::new(EntityApiErrorKind::RecordNotFound));
            }
        }

        let before = match tables.events.get(id) {
            Some(row) => tables.snapshot(row)?,
            None => return Err(Error::new(EntityApiErrorKind::RecordNotFound)),
        };

        let row = tables.event_row_mut(id)?;
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(description) = changes.description {
            row.description = Some(description);
        }
        if let Some(start_time) = changes.start_time {
            row.start_time = start_time;
        }
        if let Some(end_time) = changes.end_time {
            row.end_time = end_time;
        }
        if let Some(location) = changes.location {
            row.location = Some(location);
        }
        if let Some(participant_ids) = changes.participant_ids {
            let mut kept: Vec<ParticipationRow> = row
                .participants
                .drain(..)
                .filter(|p| participant_ids.contains(&p.user_id))
                .collect();
            for user_id in participant_ids {
                if user_id != row.creator_id && !kept.iter().any(|p| p.user_id == user_id) {
                    kept.push(ParticipationRow::invited(user_id));
                }
            }
            row.participants = kept;
        }
        row.updated_at = Some(Utc::now());

        let row = row.clone();
        let after = tables.snapshot(&row)?;

        Ok(EventUpdate { before, after })
    }

    async fn delete_event(&self, id: &Id) -> Result<Option<events::Model>, Error> {
        let mut tables = self.tables.write().await;
        match tables.events.remove(id) {
            Some(row) => tables.snapshot(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn add_participant(
        &self,
        event_id: &Id,
        user_id: &Id,
    ) -> Result<participants::Model, Error> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(user_id) {
            return Err(Error::new(EntityApiErrorKind::RecordNotFound));
        }

        let row = tables.event_row_mut(event_id)?;
        if &row.creator_id == user_id || row.participants.iter().any(|p| &p.user_id == user_id) {
            return Err(Error::new(EntityApiErrorKind::RecordAlreadyExists));
        }
        let participation = ParticipationRow::invited(user_id.clone());
        row.participants.push(participation.clone());

        tables.participant(&participation)
    }

    async fn find_participation(
        &self,
        event_id: &Id,
        user_id: &Id,
    ) -> Result<Option<participants::Model>, Error> {
        let tables = self.tables.read().await;
        tables
            .events
            .get(event_id)
            .and_then(|row| row.participants.iter().find(|p| &p.user_id == user_id))
            .map(|participation| tables.participant(participation))
            .transpose()
    }

    async fn update_participation(
        &self,
        event_id: &Id,
        user_id: &Id,
        status: participants::Status,
    ) -> Result<participants::Model, Error> {
        let mut tables = self.tables.write().await;
        let row = tables.event_row_mut(event_id)?;
        let participation = row
            .participants
            .iter_mut()
            .find(|p| &p.user_id == user_id)
            .ok_or_else(|| Error::new(EntityApiErrorKind::RecordNotFound))?;
        participation.status = status;
        participation.responded_at = Some(Utc::now());
        let participation = participation.clone();

        tables.participant(&participation)
    }
}
