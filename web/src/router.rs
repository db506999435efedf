use crate::controller::{
    event_controller, health_check_controller, user_controller, user_session_controller,
};
use crate::middleware::request_logging::request_logging;
use crate::{params, sse, AppState};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Calendar Platform API"
        ),
        paths(
            health_check_controller::health_check,
            user_controller::signup,
            user_controller::me,
            user_session_controller::login,
            user_session_controller::refresh,
            user_session_controller::logout,
            event_controller::create,
            event_controller::index,
            event_controller::read,
            event_controller::update,
            event_controller::delete,
            event_controller::invite,
            event_controller::respond,
            sse::handler::sse_handler,
        ),
        components(
            schemas(
                domain::events::Model,
                domain::participants::Model,
                domain::participants::Status,
                domain::users::Model,
                domain::users::UserInfo,
                domain::jwt::TokenPair,
                domain::user::Credentials,
                domain::user::NewUser,
                params::event::CreateParams,
                params::event::UpdateParams,
                params::event::InviteParams,
                params::event::RespondParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "calendar_platform", description = "Shared calendar events with live notifications")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Every protected endpoint expects `Authorization: Bearer <access token>`.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token returned from login or refresh"))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(auth_routes(app_state.clone()))
        .merge(event_routes(app_state.clone()))
        .merge(sse_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(from_fn(request_logging))
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn auth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/auth/signup", post(user_controller::signup))
        .route("/v1/auth/login", post(user_session_controller::login))
        .route("/v1/auth/refresh", post(user_session_controller::refresh))
        .route("/v1/auth/logout", post(user_session_controller::logout))
        .route("/v1/auth/me", get(user_controller::me))
        .with_state(app_state)
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/events",
            get(event_controller::index).post(event_controller::create),
        )
        .route(
            "/v1/events/:id",
            get(event_controller::read)
                .put(event_controller::update)
                .delete(event_controller::delete),
        )
        .route("/v1/events/:id/invite", post(event_controller::invite))
        .route("/v1/events/:id/respond", post(event_controller::respond))
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/sse/events", get(sse::handler::sse_handler))
        .with_state(app_state)
}
