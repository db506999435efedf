//! End-to-end tests that drive the full router in-process against the memory backends.

use crate::test_support::test_state;
use crate::{define_routes, AppState};
use axum::body::{to_bytes, Body, BodyDataStream};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

const PASSWORD: &str = "Passw0rdSecure";
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

struct TestUser {
    id: String,
    email: String,
    access_token: String,
    refresh_token: String,
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn refresh_request(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={refresh_token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

async fn signup(app: &Router, username: &str) -> String {
    let email = format!("{username}@example.com");
    let response = send(
        app,
        request(
            Method::POST,
            "/v1/auth/signup",
            None,
            Some(json!({
                "email": email,
                "username": username,
                "first_name": "Test",
                "last_name": "User",
                "password": PASSWORD,
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn login(app: &Router, email: &str) -> Response {
    send(
        app,
        request(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({"email": email, "password": PASSWORD})),
        ),
    )
    .await
}

async fn signup_and_login(app: &Router, username: &str) -> TestUser {
    let id = signup(app, username).await;
    let email = format!("{username}@example.com");

    let response = login(app, &email).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = body_json(response).await;

    TestUser {
        id,
        email,
        access_token: tokens["access_token"].as_str().unwrap().to_string(),
        refresh_token: tokens["refresh_token"].as_str().unwrap().to_string(),
    }
}

fn test_app() -> (AppState, Router) {
    let state = test_state();
    let app = define_routes(state.clone());
    (state, app)
}

/// Reads `data:` frames off a live `text/event-stream` body.
struct SseReader {
    body: BodyDataStream,
    buffer: String,
}

impl SseReader {
    async fn open(app: &Router, user: &TestUser) -> Self {
        let response = send(
            app,
            request(Method::GET, "/v1/sse/events", Some(&user.access_token), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        Self {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    async fn next_frame(&mut self) -> Value {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..end + 2).collect();
                let data = raw
                    .lines()
                    .find_map(|line| line.strip_prefix("data:"))
                    .map(str::trim);
                match data {
                    Some(data) => return serde_json::from_str(data).unwrap(),
                    // Keep-alive comment.
                    None => continue,
                }
            }

            let chunk = tokio::time::timeout(FRAME_TIMEOUT, self.body.next())
                .await
                .expect("timed out waiting for an SSE frame")
                .expect("SSE stream ended")
                .unwrap();
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    async fn assert_silent(&mut self) {
        assert!(!self.buffer.contains("data:"), "unexpected frame buffered");
        let next = tokio::time::timeout(Duration::from_millis(150), self.body.next()).await;
        assert!(next.is_err(), "unexpected SSE frame: {next:?}");
    }
}

fn status_of(event: &Value, user_id: &str) -> Option<String> {
    event["participants"]
        .as_array()?
        .iter()
        .find(|participant| participant["user"]["id"] == user_id)
        .map(|participant| participant["status"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_health_check_reports_connections() {
    let (_state, app) = test_app();

    let response = send(&app, request(Method::GET, "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sse_connections"], 0);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let (_state, app) = test_app();

    let response = send(&app, request(Method::GET, "/api-docs/openapi.json", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/v1/events/{id}/respond"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_signup_validation_and_conflicts() {
    let (_state, app) = test_app();
    signup(&app, "alice").await;

    let duplicate = send(
        &app,
        request(
            Method::POST,
            "/v1/auth/signup",
            None,
            Some(json!({
                "email": "alice@example.com",
                "username": "alice2",
                "first_name": "Alice",
                "last_name": "Again",
                "password": PASSWORD,
            })),
        ),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(duplicate).await["error"]["code"], "CONFLICT");

    let weak_password = send(
        &app,
        request(
            Method::POST,
            "/v1/auth/signup",
            None,
            Some(json!({
                "email": "bob@example.com",
                "username": "bob",
                "first_name": "Bob",
                "last_name": "Builder",
                "password": "short",
            })),
        ),
    )
    .await;
    assert_eq!(weak_password.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(weak_password).await["error"]["code"],
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn test_login_sets_refresh_cookie_and_me_returns_the_user() {
    let (_state, app) = test_app();
    let id = signup(&app, "alice").await;

    let response = login(&app, "alice@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("refresh_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    // Development runtime, so no Secure flag.
    assert!(!cookie.contains("Secure"));

    let tokens = body_json(response).await;
    assert_eq!(tokens["token_type"], "bearer");

    let me = send(
        &app,
        request(
            Method::GET,
            "/v1/auth/me",
            tokens["access_token"].as_str(),
            None,
        ),
    )
    .await;
    assert_eq!(me.status(), StatusCode::OK);
    let user = body_json(me).await;
    assert_eq!(user["id"], id.as_str());
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let (_state, app) = test_app();
    signup(&app, "alice").await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({"email": "alice@example.com", "password": "Wr0ngPassword"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_protected_routes_reject_missing_and_bad_tokens() {
    let (_state, app) = test_app();

    let missing = send(&app, request(Method::GET, "/v1/events", None, None)).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await["error"]["code"], "AUTHENTICATION_ERROR");

    let garbage = send(
        &app,
        request(Method::GET, "/v1/events", Some("not-a-jwt"), None),
    )
    .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(garbage).await["error"]["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;

    let rotated = send(&app, refresh_request(&alice.refresh_token)).await;
    assert_eq!(rotated.status(), StatusCode::OK);
    let new_cookie = set_cookie(&rotated);
    let tokens = body_json(rotated).await;
    let new_refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, alice.refresh_token);
    assert!(new_cookie.starts_with(&format!("refresh_token={new_refresh}")));

    let replay = send(&app, refresh_request(&alice.refresh_token)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(replay).await["error"]["code"], "AUTHENTICATION_ERROR");

    let again = send(&app, refresh_request(&new_refresh)).await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_cookie_is_rejected() {
    let (_state, app) = test_app();

    let response = send(&app, request(Method::POST, "/v1/auth/refresh", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");
    assert_eq!(body["error"]["message"], "Missing refresh token");
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_token() {
    let (_state, app) = test_app();
    let first = signup_and_login(&app, "alice").await;

    let second = login(&app, &first.email).await;
    assert_eq!(second.status(), StatusCode::OK);

    let stale = send(&app, refresh_request(&first.refresh_token)).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_and_clears_cookie() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;

    let response = send(
        &app,
        request(Method::POST, "/v1/auth/logout", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("refresh_token=;"));
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(
        body_json(response).await["message"],
        "Successfully logged out"
    );

    let refresh = send(&app, refresh_request(&alice.refresh_token)).await;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_crud_and_access_rules() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;
    let carol = signup_and_login(&app, "carol").await;

    let created = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "  Planning  ",
                "start_time": "2030-01-01T09:00:00Z",
                "end_time": "2030-01-01T10:00:00Z",
                "participant_emails": [bob.email, "nobody@example.com"],
            })),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let event = body_json(created).await;
    let event_id = event["id"].as_str().unwrap().to_string();
    assert_eq!(event["title"], "Planning");
    assert_eq!(event["creator_id"], alice.id.as_str());
    assert_eq!(status_of(&event, &bob.id).as_deref(), Some("invited"));
    assert_eq!(event["participants"].as_array().unwrap().len(), 1);

    let uri = format!("/v1/events/{event_id}");

    let by_bob = send(&app, request(Method::GET, &uri, Some(&bob.access_token), None)).await;
    assert_eq!(by_bob.status(), StatusCode::OK);

    let by_carol = send(&app, request(Method::GET, &uri, Some(&carol.access_token), None)).await;
    assert_eq!(by_carol.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(by_carol).await["error"]["code"], "ACCESS_DENIED");

    let missing = send(
        &app,
        request(Method::GET, "/v1/events/unknown", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bob_edit = send(
        &app,
        request(
            Method::PUT,
            &uri,
            Some(&bob.access_token),
            Some(json!({"title": "Mine now"})),
        ),
    )
    .await;
    assert_eq!(bob_edit.status(), StatusCode::FORBIDDEN);

    let bob_list = send(
        &app,
        request(Method::GET, "/v1/events?limit=500", Some(&bob.access_token), None),
    )
    .await;
    assert_eq!(bob_list.status(), StatusCode::OK);
    assert_eq!(body_json(bob_list).await.as_array().unwrap().len(), 1);

    let carol_list = send(
        &app,
        request(Method::GET, "/v1/events", Some(&carol.access_token), None),
    )
    .await;
    assert!(body_json(carol_list).await.as_array().unwrap().is_empty());

    let deleted = send(&app, request(Method::DELETE, &uri, Some(&alice.access_token), None)).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = send(&app, request(Method::GET, &uri, Some(&alice.access_token), None)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_validation_errors() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;

    let backwards = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "Backwards",
                "start_time": "2030-01-01T10:00:00Z",
                "end_time": "2030-01-01T09:00:00Z",
            })),
        ),
    )
    .await;
    assert_eq!(backwards.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(backwards).await["error"]["code"], "VALIDATION_ERROR");

    let untitled = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "   ",
                "start_time": "2030-01-01T09:00:00Z",
                "end_time": "2030-01-01T10:00:00Z",
            })),
        ),
    )
    .await;
    assert_eq!(untitled.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invite_and_respond_rules() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;
    let carol = signup_and_login(&app, "carol").await;

    let created = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "Review",
                "start_time": "2030-02-01T09:00:00Z",
                "end_time": "2030-02-01T10:00:00Z",
            })),
        ),
    )
    .await;
    let event_id = body_json(created).await["id"].as_str().unwrap().to_string();
    let invite_uri = format!("/v1/events/{event_id}/invite");
    let respond_uri = format!("/v1/events/{event_id}/respond");

    let unknown = send(
        &app,
        request(
            Method::POST,
            &invite_uri,
            Some(&alice.access_token),
            Some(json!({"participant_email": "nobody@example.com"})),
        ),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let invited = send(
        &app,
        request(
            Method::POST,
            &invite_uri,
            Some(&alice.access_token),
            Some(json!({"participant_email": bob.email})),
        ),
    )
    .await;
    assert_eq!(invited.status(), StatusCode::OK);
    assert_eq!(
        status_of(&body_json(invited).await, &bob.id).as_deref(),
        Some("invited")
    );

    let twice = send(
        &app,
        request(
            Method::POST,
            &invite_uri,
            Some(&alice.access_token),
            Some(json!({"participant_email": bob.email})),
        ),
    )
    .await;
    assert_eq!(twice.status(), StatusCode::CONFLICT);

    let creator = send(
        &app,
        request(
            Method::POST,
            &invite_uri,
            Some(&alice.access_token),
            Some(json!({"participant_email": alice.email})),
        ),
    )
    .await;
    assert_eq!(creator.status(), StatusCode::CONFLICT);

    let maybe = send(
        &app,
        request(
            Method::POST,
            &respond_uri,
            Some(&bob.access_token),
            Some(json!({"status": "maybe"})),
        ),
    )
    .await;
    assert_eq!(maybe.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let uninvited = send(
        &app,
        request(
            Method::POST,
            &respond_uri,
            Some(&carol.access_token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(uninvited.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(uninvited).await["error"]["message"],
        "You are not invited to this event"
    );

    let declined = send(
        &app,
        request(
            Method::POST,
            &respond_uri,
            Some(&bob.access_token),
            Some(json!({"status": "declined"})),
        ),
    )
    .await;
    assert_eq!(declined.status(), StatusCode::OK);
    let event = body_json(declined).await;
    assert_eq!(status_of(&event, &bob.id).as_deref(), Some("declined"));
    assert!(event["participants"][0]["responded_at"].is_string());
}

#[tokio::test]
async fn test_sse_invite_and_response_scenario() {
    let (state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;

    let mut alice_stream = SseReader::open(&app, &alice).await;
    assert_eq!(alice_stream.next_frame().await, json!({"type": "connected"}));

    let mut bob_stream = SseReader::open(&app, &bob).await;
    assert_eq!(bob_stream.next_frame().await, json!({"type": "connected"}));
    assert_eq!(state.sse_manager.connection_count(), 2);

    let created = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "Lunch",
                "start_time": "2030-03-01T12:00:00Z",
                "end_time": "2030-03-01T13:00:00Z",
                "participant_emails": [bob.email],
            })),
        ),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let event_id = body_json(created).await["id"].as_str().unwrap().to_string();

    let invite = bob_stream.next_frame().await;
    assert_eq!(invite["type"], "event_invite_sent");
    assert_eq!(invite["data"]["id"], event_id.as_str());
    assert_eq!(status_of(&invite["data"], &bob.id).as_deref(), Some("invited"));
    assert_eq!(alice_stream.next_frame().await["type"], "event_invite_sent");

    let accepted = send(
        &app,
        request(
            Method::POST,
            &format!("/v1/events/{event_id}/respond"),
            Some(&bob.access_token),
            Some(json!({"status": "accepted"})),
        ),
    )
    .await;
    assert_eq!(accepted.status(), StatusCode::OK);

    for stream in [&mut alice_stream, &mut bob_stream] {
        let frame = stream.next_frame().await;
        assert_eq!(frame["type"], "event_response_updated");
        assert_eq!(status_of(&frame["data"], &bob.id).as_deref(), Some("accepted"));
    }
}

#[tokio::test]
async fn test_sse_participant_replacement_scenario() {
    let (_state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;
    let carol = signup_and_login(&app, "carol").await;
    let dave = signup_and_login(&app, "dave").await;

    let created = send(
        &app,
        request(
            Method::POST,
            "/v1/events",
            Some(&alice.access_token),
            Some(json!({
                "title": "Offsite",
                "start_time": "2030-04-01T09:00:00Z",
                "end_time": "2030-04-01T17:00:00Z",
                "participant_emails": [bob.email, carol.email],
            })),
        ),
    )
    .await;
    let event_id = body_json(created).await["id"].as_str().unwrap().to_string();

    // Dave never connects. Delivery to him is skipped without an error.
    let mut alice_stream = SseReader::open(&app, &alice).await;
    let mut bob_stream = SseReader::open(&app, &bob).await;
    let mut carol_stream = SseReader::open(&app, &carol).await;
    for stream in [&mut alice_stream, &mut bob_stream, &mut carol_stream] {
        assert_eq!(stream.next_frame().await["type"], "connected");
    }

    let updated = send(
        &app,
        request(
            Method::PUT,
            &format!("/v1/events/{event_id}"),
            Some(&alice.access_token),
            Some(json!({"participant_emails": [carol.email, dave.email]})),
        ),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::OK);

    for stream in [&mut alice_stream, &mut carol_stream] {
        let frame = stream.next_frame().await;
        assert_eq!(frame["type"], "event_updated");
        assert_eq!(status_of(&frame["data"], &dave.id).as_deref(), Some("invited"));
    }

    let removed = bob_stream.next_frame().await;
    assert_eq!(removed["type"], "event_deleted");
    assert_eq!(removed["data"]["id"], event_id.as_str());
    bob_stream.assert_silent().await;
}

#[tokio::test]
async fn test_sse_requires_authentication() {
    let (state, app) = test_app();

    let response = send(&app, request(Method::GET, "/v1/sse/events", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.sse_manager.connection_count(), 0);
}

#[tokio::test]
async fn test_dropping_the_stream_unregisters_and_shutdown_ends_streams() {
    let (state, app) = test_app();
    let alice = signup_and_login(&app, "alice").await;
    let bob = signup_and_login(&app, "bob").await;

    let alice_stream = SseReader::open(&app, &alice).await;
    let mut bob_stream = SseReader::open(&app, &bob).await;
    assert_eq!(bob_stream.next_frame().await["type"], "connected");
    assert_eq!(state.sse_manager.connection_count(), 2);

    drop(alice_stream);
    assert!(!state.sse_manager.is_connected(&alice.id));

    state.sse_manager.shutdown();

    let end = tokio::time::timeout(FRAME_TIMEOUT, bob_stream.body.next())
        .await
        .expect("stream did not end after shutdown");
    assert!(end.is_none());
    assert_eq!(state.sse_manager.connection_count(), 0);
}
