pub mod auth;
pub mod gcode_files;
pub mod health;
pub mod notification_settings;
pub mod print_shot_feedbacks;
pub mod printers;
pub mod prints;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Everything under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/printers", printers::router())
        .nest("/prints", prints::router())
        .nest("/gcode_files", gcode_files::router())
        .nest("/print_shot_feedbacks", print_shot_feedbacks::router())
        .nest("/notification_settings", notification_settings::router())
}
