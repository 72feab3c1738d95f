//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (stores, queue, worker pool, broker)
//! - `routes/`: HTTP/WS routes + handlers
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router, routing::get};

use crate::config::ApiConfig;
use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppRuntime, AppServices};

/// Build the full HTTP router plus the background runtime.
pub fn build_app(config: &ApiConfig) -> (Router, AppRuntime) {
    let auth_state = middleware::AuthState::new(&config.jwt_secret);
    let (services, runtime) = services::build_services(config);

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected);

    (router, runtime)
}
