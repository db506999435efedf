use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use ::sse::StreamHandler;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use log::*;
use std::convert::Infallible;
use std::time::Duration;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Opens the notification stream for the authenticated user.
///
/// A user has at most one live stream. Opening a second one ends the first.
#[utoipa::path(
    get,
    path = "/v1/sse/events",
    responses(
        (status = 200, description = "text/event-stream of JSON notification frames"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn sse_handler(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing SSE connection for user {}", user.id);

    let frames = StreamHandler::new(app_state.sse_manager.clone(), user.id).into_stream();
    let stream = frames.map(|frame| Ok(Event::default().data(frame)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
