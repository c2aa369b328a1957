use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;

use crate::db::{CreateGCodeFile, GCodeFile, GCodeFileRepository, UpdateGCodeFile};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_gcode_files).post(create_gcode_file))
        .route(
            "/:id",
            get(get_gcode_file)
                .patch(update_gcode_file)
                .put(update_gcode_file)
                .delete(delete_gcode_file),
        )
}

/// Newest first.
async fn list_gcode_files(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<GCodeFile>>> {
    Ok(Json(GCodeFileRepository::list(&state.db, user.id).await?))
}

async fn create_gcode_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreateGCodeFile>, AppError>,
) -> AppResult<(StatusCode, Json<GCodeFile>)> {
    if body.filename.trim().is_empty() {
        return Err(AppError::BadRequest("filename must not be empty".to_string()));
    }
    let file = GCodeFileRepository::create(&state.db, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn get_gcode_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<GCodeFile>> {
    GCodeFileRepository::find(&state.db, user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("GCode file"))
}

async fn update_gcode_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateGCodeFile>, AppError>,
) -> AppResult<Json<GCodeFile>> {
    GCodeFileRepository::update(&state.db, user.id, id, body)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("GCode file"))
}

async fn delete_gcode_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<StatusCode> {
    if !GCodeFileRepository::delete(&state.db, user.id, id).await? {
        return Err(AppError::not_found("GCode file"));
    }
    Ok(StatusCode::NO_CONTENT)
}
