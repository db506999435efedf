//! Logs every request and response and tags both with a request id.

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use log::*;
use std::time::Instant;
use uuid::Uuid;

pub(crate) static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub(crate) async fn request_logging(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = header_value.clone() {
        request.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }

    debug!("[{request_id}] --> {method} {path}");

    let mut response = next.run(request).await;

    info!(
        "[{request_id}] {method} {path} {} {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );

    if let Some(value) = header_value {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }

    response
}
