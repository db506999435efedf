//! Calendar event operations.
//!
//! Every mutation completes its data-layer write first, then decides who should hear
//! about it and hands a `DomainEvent` to the publisher. Recipients are derived from the
//! snapshots the data layer returns for that same write, never from an earlier read:
//!
//! | Mutation | Recipients | Event |
//! |---|---|---|
//! | create with invitees | creator and participants | `EventInviteSent` |
//! | update | creator and remaining participants | `EventUpdated` |
//! | update that removes participants | removed participants only | `EventDeleted` |
//! | delete | creator and participants at deletion | `EventDeleted` |
//! | invite | creator and participants after the invite | `EventInviteSent` |
//! | respond | creator and participants | `EventResponseUpdated` |

use crate::error::{AuthErrorKind, Error};
use crate::{events, participants, Database, Id};
use chrono::{DateTime, Utc};
use entity_api::{
    EventChanges, EventFilter, EventRepository, EventUpdate, NewEvent, UserRepository,
};
use ::events::{DomainEvent, EventPublisher};
use log::*;
use serde_json::Value;
use std::collections::BTreeSet;

const MAX_TITLE_LEN: usize = 200;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug)]
pub struct CreateEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub participant_emails: Vec<String>,
}

/// A partial update. When `participant_emails` is present it replaces the participant
/// set: users who stay keep their response, newcomers are invited.
#[derive(Clone, Debug, Default)]
pub struct UpdateEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub participant_emails: Option<Vec<String>>,
}

pub async fn create(
    db: &dyn Database,
    publisher: &EventPublisher,
    creator_id: &Id,
    params: CreateEvent,
) -> Result<events::Model, Error> {
    let title = validate_title(&params.title)?;
    validate_window(params.start_time, params.end_time)?;
    let invitees = resolve_participants(db, creator_id, &params.participant_emails).await?;

    let event = db
        .create_event(
            creator_id,
            NewEvent {
                title,
                description: params.description,
                start_time: params.start_time,
                end_time: params.end_time,
                location: params.location,
                participant_ids: invitees.into_iter().collect(),
            },
        )
        .await?;

    if event.participants.is_empty() {
        info!("User {creator_id} created event {}", event.id);
        return Ok(event);
    }

    info!(
        "User {creator_id} created event {} with {} invitee(s)",
        event.id,
        event.participants.len()
    );

    notify(publisher, Notice::InviteSent, &event, event.interested_user_ids()).await;
    Ok(event)
}

/// Events the user created or participates in, ordered by start time.
pub async fn find_for_user(
    db: &dyn Database,
    user_id: &Id,
    mut filter: EventFilter,
) -> Result<Vec<events::Model>, Error> {
    filter.limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
    Ok(db.find_events_for_user(user_id, &filter).await?)
}

/// Fetches an event the user may read: its creator or one of its participants.
pub async fn find_visible(
    db: &dyn Database,
    user_id: &Id,
    event_id: &Id,
) -> Result<events::Model, Error> {
    let event = find_by_id(db, event_id).await?;
    if !event.is_visible_to(user_id) {
        warn!("User {user_id} denied access to event {event_id}");
        return Err(Error::auth(AuthErrorKind::AccessDenied));
    }
    Ok(event)
}

pub async fn update(
    db: &dyn Database,
    publisher: &EventPublisher,
    user_id: &Id,
    event_id: &Id,
    params: UpdateEvent,
) -> Result<events::Model, Error> {
    let existing = find_owned(db, user_id, event_id).await?;

    let title = params.title.as_deref().map(validate_title).transpose()?;
    validate_window(
        params.start_time.unwrap_or(existing.start_time),
        params.end_time.unwrap_or(existing.end_time),
    )?;

    let participant_ids: Option<Vec<Id>> = match &params.participant_emails {
        Some(emails) => Some(
            resolve_participants(db, &existing.creator_id, emails)
                .await?
                .into_iter()
                .collect(),
        ),
        None => None,
    };

    let EventUpdate { before, after } = db
        .update_event(
            event_id,
            EventChanges {
                title,
                description: params.description,
                start_time: params.start_time,
                end_time: params.end_time,
                location: params.location,
                participant_ids,
            },
        )
        .await?;

    let removed: BTreeSet<Id> = before
        .participant_ids()
        .difference(&after.participant_ids())
        .cloned()
        .collect();

    info!(
        "User {user_id} updated event {event_id}, removing {} participant(s)",
        removed.len()
    );

    notify(publisher, Notice::Updated, &after, after.interested_user_ids()).await;
    notify(publisher, Notice::Deleted, &after, removed).await;

    Ok(after)
}

pub async fn delete(
    db: &dyn Database,
    publisher: &EventPublisher,
    user_id: &Id,
    event_id: &Id,
) -> Result<(), Error> {
    find_owned(db, user_id, event_id).await?;

    let deleted = db
        .delete_event(event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event not found"))?;

    info!("User {user_id} deleted event {event_id}");

    notify(
        publisher,
        Notice::Deleted,
        &deleted,
        deleted.interested_user_ids(),
    )
    .await;
    Ok(())
}

/// Invites the user registered under `email`. Inviting the creator or someone already
/// invited is a conflict.
pub async fn invite(
    db: &dyn Database,
    publisher: &EventPublisher,
    user_id: &Id,
    event_id: &Id,
    email: &str,
) -> Result<events::Model, Error> {
    let existing = find_owned(db, user_id, event_id).await?;

    let invitee = db
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| Error::not_found("No user registered with that email"))?;

    if invitee.id == existing.creator_id || existing.is_participant(&invitee.id) {
        return Err(Error::conflict("User is already part of this event"));
    }

    db.add_participant(event_id, &invitee.id).await?;
    let event = find_by_id(db, event_id).await?;

    info!("User {user_id} invited {} to event {event_id}", invitee.id);

    notify(publisher, Notice::InviteSent, &event, event.interested_user_ids()).await;
    Ok(event)
}

/// Records the caller's answer to an invitation. Only `accepted` and `declined` are
/// valid answers.
pub async fn respond(
    db: &dyn Database,
    publisher: &EventPublisher,
    user_id: &Id,
    event_id: &Id,
    status: participants::Status,
) -> Result<events::Model, Error> {
    if status == participants::Status::Invited {
        return Err(Error::invalid("Status must be accepted or declined"));
    }

    // Existence first so an unknown event is a 404 rather than "not invited".
    find_by_id(db, event_id).await?;

    if db.find_participation(event_id, user_id).await?.is_none() {
        return Err(Error::not_found("You are not invited to this event"));
    }

    db.update_participation(event_id, user_id, status).await?;
    let event = find_by_id(db, event_id).await?;

    info!("User {user_id} responded {status} to event {event_id}");

    notify(
        publisher,
        Notice::ResponseUpdated,
        &event,
        event.interested_user_ids(),
    )
    .await;
    Ok(event)
}

async fn find_by_id(db: &dyn Database, event_id: &Id) -> Result<events::Model, Error> {
    db.find_event_by_id(event_id)
        .await?
        .ok_or_else(|| Error::not_found("Event not found"))
}

/// Fetches an event only its creator may change.
async fn find_owned(
    db: &dyn Database,
    user_id: &Id,
    event_id: &Id,
) -> Result<events::Model, Error> {
    let event = find_by_id(db, event_id).await?;
    if &event.creator_id != user_id {
        warn!("User {user_id} is not the creator of event {event_id}");
        return Err(Error::auth(AuthErrorKind::AccessDenied));
    }
    Ok(event)
}

/// Ids of registered users behind `emails`, excluding the creator. Unknown emails are
/// skipped.
async fn resolve_participants(
    db: &dyn Database,
    creator_id: &Id,
    emails: &[String],
) -> Result<BTreeSet<Id>, Error> {
    let mut ids = BTreeSet::new();
    for email in emails {
        match db.find_user_by_email(email.trim()).await? {
            Some(user) if &user.id != creator_id => {
                ids.insert(user.id);
            }
            Some(_) => {}
            None => debug!("Ignoring unknown participant email {email}"),
        }
    }
    Ok(ids)
}

fn validate_title(title: &str) -> Result<String, Error> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::invalid("Title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::invalid(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_window(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<(), Error> {
    if end_time <= start_time {
        return Err(Error::invalid("End time must be after start time"));
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Notice {
    Updated,
    InviteSent,
    ResponseUpdated,
    Deleted,
}

// A failed notification never fails the mutation that triggered it.
async fn notify(
    publisher: &EventPublisher,
    notice: Notice,
    event: &events::Model,
    recipients: BTreeSet<Id>,
) {
    if recipients.is_empty() {
        return;
    }

    let snapshot: Value = match serde_json::to_value(event) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!("Failed to serialize event {} for notification: {err}", event.id);
            return;
        }
    };

    let event_id = event.id.clone();
    let notify_user_ids: Vec<Id> = recipients.into_iter().collect();

    let domain_event = match notice {
        Notice::Updated => DomainEvent::EventUpdated {
            event_id,
            event: snapshot,
            notify_user_ids,
        },
        Notice::InviteSent => DomainEvent::EventInviteSent {
            event_id,
            event: snapshot,
            notify_user_ids,
        },
        Notice::ResponseUpdated => DomainEvent::EventResponseUpdated {
            event_id,
            event: snapshot,
            notify_user_ids,
        },
        Notice::Deleted => DomainEvent::EventDeleted {
            event_id,
            event: snapshot,
            notify_user_ids,
        },
    };

    publisher.publish(domain_event).await;
}
