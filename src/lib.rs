//! Bank System Library
//!
//! Banking backend: identity, bank accounts, cards and money transfers.
//! Re-exports modules for the binary and integration tests.

use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod notification;
pub mod repository;
pub mod services;
pub mod validation;

pub use api::AppState;
pub use config::Config;
pub use domain::{DomainError, OperationContext};
pub use error::{AppError, AppResult, ErrorResponse};

/// CORS layer for the configured origins
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: logging -> auth -> handler
    let protected_routes = api::create_router().layer(middleware::from_fn_with_state(
        state.clone(),
        api::middleware::auth_middleware,
    ));

    let api_routes = api::create_public_router()
        .merge(protected_routes)
        .layer(middleware::from_fn(api::middleware::logging_middleware));

    Router::new()
        // Health check (no auth)
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(create_cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
