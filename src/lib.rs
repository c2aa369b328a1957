//! Backend for remote 3D-printer monitoring: printers, prints, gcode files,
//! print-shot feedback and notification settings over a JSON API.

use std::sync::Arc;

use axum::{routing::get, Router};
use http::HeaderValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use config::Config;
use services::status::StatusNotifier;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub notifier: StatusNotifier,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config) -> Self {
        Self {
            db,
            config,
            notifier: StatusNotifier::default(),
        }
    }
}

/// Build the application router with its shared middleware.
///
/// Rate limiting is layered on by the binary, since it needs the peer
/// address from the listener.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let frontend_origin = state
        .config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/v1", routes::api_router())
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::security_headers::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(frontend_origin)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                    http::Method::PATCH,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    Ok(app)
}
