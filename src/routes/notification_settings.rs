use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;

use crate::db::{
    validate_config_json, CreateNotificationSetting, NotificationSetting,
    NotificationSettingRepository, UpdateNotificationSetting,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_settings).post(create_setting))
        .route(
            "/:id",
            get(get_setting)
                .patch(update_setting)
                .put(update_setting)
                .delete(delete_setting),
        )
}

async fn list_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<NotificationSetting>>> {
    Ok(Json(
        NotificationSettingRepository::list(&state.db, user.id).await?,
    ))
}

/// A second setting with the same name for the same user is a 409.
async fn create_setting(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreateNotificationSetting>, AppError>,
) -> AppResult<(StatusCode, Json<NotificationSetting>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    validate_config_json(&body.config_json).map_err(AppError::BadRequest)?;

    let setting = NotificationSettingRepository::create(&state.db, user.id, body).await?;
    tracing::info!(
        "User {} added notification setting '{}'",
        user.id,
        setting.name
    );
    Ok((StatusCode::CREATED, Json(setting)))
}

async fn get_setting(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<NotificationSetting>> {
    NotificationSettingRepository::find(&state.db, user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Notification setting"))
}

async fn update_setting(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateNotificationSetting>, AppError>,
) -> AppResult<Json<NotificationSetting>> {
    if let Some(ref config_json) = body.config_json {
        validate_config_json(config_json).map_err(AppError::BadRequest)?;
    }

    NotificationSettingRepository::update(&state.db, user.id, id, body)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Notification setting"))
}

async fn delete_setting(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<StatusCode> {
    if !NotificationSettingRepository::delete(&state.db, user.id, id).await? {
        return Err(AppError::not_found("Notification setting"));
    }
    Ok(StatusCode::NO_CONTENT)
}
