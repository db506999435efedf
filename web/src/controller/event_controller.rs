use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::params::event::{CreateParams, IndexParams, InviteParams, RespondParams, UpdateParams};
use crate::{AppState, Error};
use domain::{event as EventApi, events, participants, Id};
use log::*;

/// POST create a new Event, inviting the given participants
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully created a new Event", body = events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Unprocessable Entity"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Create a new Event from: {params:?}");

    let event = EventApi::create(
        app_state.db(),
        &app_state.event_publisher,
        &user.id,
        params.into(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET the Events the current user created or was invited to, ordered by start time
#[utoipa::path(
    get,
    path = "/v1/events",
    params(IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved Events", body = [events::Model]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn index(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all Events for User {} with: {params:?}", user.id);

    let events = EventApi::find_for_user(app_state.db(), &user.id, params.into()).await?;

    Ok(Json(events))
}

/// GET a particular Event specified by its id
#[utoipa::path(
    get,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Event id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved the Event", body = events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the creator or a participant"),
        (status = 404, description = "Event not found"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn read(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET Event by id: {id}");

    let event = EventApi::find_visible(app_state.db(), &user.id, &id).await?;

    Ok(Json(event))
}

/// PUT update an Event. Only its creator may do this.
#[utoipa::path(
    put,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Id of the Event to update")
    ),
    request_body = UpdateParams,
    responses(
        (status = 200, description = "Successfully updated the Event", body = events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Event not found"),
        (status = 422, description = "Unprocessable Entity"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<UpdateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT Update Event {id} with: {params:?}");

    let event = EventApi::update(
        app_state.db(),
        &app_state.event_publisher,
        &user.id,
        &id,
        params.into(),
    )
    .await?;

    Ok(Json(event))
}

/// DELETE an Event. Only its creator may do this.
#[utoipa::path(
    delete,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Id of the Event to delete")
    ),
    responses(
        (status = 204, description = "Successfully deleted the Event"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Event not found"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE Event by id: {id}");

    EventApi::delete(app_state.db(), &app_state.event_publisher, &user.id, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST invite one more participant to an Event
#[utoipa::path(
    post,
    path = "/v1/events/{id}/invite",
    params(
        ("id" = String, Path, description = "Id of the Event to invite to")
    ),
    request_body = InviteParams,
    responses(
        (status = 200, description = "Participant invited", body = events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Event or user not found"),
        (status = 409, description = "Already a participant or the creator"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn invite(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<InviteParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST Invite {} to Event {id}", params.participant_email);

    let event = EventApi::invite(
        app_state.db(),
        &app_state.event_publisher,
        &user.id,
        &id,
        &params.participant_email,
    )
    .await?;

    Ok(Json(event))
}

/// POST accept or decline an invitation
#[utoipa::path(
    post,
    path = "/v1/events/{id}/respond",
    params(
        ("id" = String, Path, description = "Id of the Event to respond to")
    ),
    request_body = RespondParams,
    responses(
        (status = 200, description = "Response recorded", body = events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Event not found or not invited"),
        (status = 422, description = "Status must be accepted or declined"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn respond(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
    Json(params): Json<RespondParams>,
) -> Result<impl IntoResponse, Error> {
    let status = participants::Status::try_from(params)?;
    debug!("POST User {} responds {status} to Event {id}", user.id);

    let event = EventApi::respond(
        app_state.db(),
        &app_state.event_publisher,
        &user.id,
        &id,
        status,
    )
    .await?;

    Ok(Json(event))
}
