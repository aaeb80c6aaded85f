use axum::{response::IntoResponse, response::Response, routing::get, Router};
use std::any::Any;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use models::errors::CatalogError;
use routes::{books::list_books, health::health_check};
use services::catalog::Backend;

/// A panic inside a request is reported like any other filtering fault.
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let cause = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown internal fault".to_string()
    };

    error!("Request handler panicked: {}", cause);
    CatalogError::Evaluation(cause).into_response()
}

pub fn build_router(backend: Backend, request_timeout: Duration) -> Router {
    Router::new()
        .route("/status", get(health_check))
        .route("/books", get(list_books))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
}
