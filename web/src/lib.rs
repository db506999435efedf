//! HTTP boundary of the calendar platform.
//!
//! Routes, controllers and extractors live here together with the mapping from domain
//! errors to HTTP responses. Business rules stay in `domain`, delivery of live
//! notifications stays in `sse`.

use axum::http::{header, HeaderValue, Method};
use domain::error::Error as DomainError;
use domain::jwt::TokenCodec;
use domain::refresh_token_store::RefreshTokenStore;
use domain::{Database, SessionManager};
use events::EventPublisher;
use log::*;
use service::config::Config;
use ::sse::{Manager, SseDomainEventHandler};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

mod controller;
mod cookies;
mod error;
mod extractors;
mod middleware;
mod params;
mod router;
mod sse;

#[cfg(test)]
mod api_tests;

pub use self::error::{Error, Result};
pub use router::define_routes;

/// Everything a request handler needs, shared across all requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub database: Arc<dyn Database>,
    pub sessions: Arc<SessionManager>,
    pub sse_manager: Arc<Manager>,
    pub event_publisher: Arc<EventPublisher>,
}

impl AppState {
    /// Wires the session subsystem and the notification pipeline around `database`.
    /// Fails when the token settings in `config` are unusable.
    pub fn new(
        config: Config,
        database: Arc<dyn Database>,
        refresh_store: Arc<dyn RefreshTokenStore>,
    ) -> std::result::Result<Self, DomainError> {
        let codec = TokenCodec::from_config(&config)?;
        let sessions = Arc::new(SessionManager::new(codec, refresh_store, database.clone()));

        let sse_manager = Arc::new(Manager::with_settings(
            config.sse_channel_capacity,
            Duration::from_millis(config.sse_poll_interval_millis),
        ));
        let event_publisher = Arc::new(
            EventPublisher::new()
                .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone()))),
        );

        Ok(Self {
            config,
            database,
            sessions,
            sse_manager,
            event_publisher,
        })
    }

    pub fn db(&self) -> &dyn Database {
        self.database.as_ref()
    }
}

/// Serves the API until `shutdown` resolves, then drains in-flight requests.
///
/// Open subscriptions only end once the SSE manager is shut down, so `shutdown` is
/// expected to do that before it resolves.
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let host = format!("{}:{}", interface, app_state.config.port);

    info!("Server starting... listening for connections on http://{host}");

    let listener = tokio::net::TcpListener::bind(host).await?;

    let cors_layer = cors_layer(&app_state.config);
    let app = define_routes(app_state).layer(cors_layer);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring malformed CORS origin: {origin}");
                None
            }
        })
        .collect();

    info!("CORS allowed origins: {:?}", config.allowed_origins);

    CorsLayer::new()
        .allow_methods([
            Method::DELETE,
            Method::GET,
            Method::OPTIONS,
            Method::POST,
            Method::PUT,
        ])
        .allow_credentials(true)
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers([middleware::request_logging::X_REQUEST_ID.clone()])
        .allow_origin(allowed_origins)
}
