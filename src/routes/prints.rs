use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::db::{CreatePrint, Print, PrintFilter, PrintRepository, PrintSorting, PrinterRepository, UpdatePrint};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::prints::{page, PrintService};
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 12;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_prints).post(create_print))
        .route("/bulk_delete", post(bulk_delete))
        .route(
            "/:id",
            get(get_print).patch(update_print).delete(delete_print),
        )
        .route(
            "/:id/alert_overwrite",
            get(tag_alert_legacy).post(set_alert_overwrite),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Listing parameters. `start` and `limit` must be non-negative integers.
#[derive(Debug, Deserialize)]
pub struct ListPrintsQuery {
    pub filter: Option<String>,
    pub sorting: Option<String>,
    pub start: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AlertOverwriteQuery {
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertOverwriteRequest {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TagAlertResponse {
    pub user_credited: bool,
}

/// A missing `print_ids` is an empty list.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub print_ids: Vec<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List prints that have a video.
///
/// The whole filtered, ordered set is loaded and the page is cut in memory;
/// OFFSET/LIMIT in SQL is far slower on this query shape.
async fn list_prints(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListPrintsQuery>, AppError>,
) -> AppResult<Json<Vec<Print>>> {
    let filter = PrintFilter::parse(query.filter.as_deref());
    let sorting = PrintSorting::parse(query.sorting.as_deref());

    let prints = PrintRepository::list_with_video(&state.db, user.id, filter, sorting).await?;
    let start = query.start.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    Ok(Json(page(prints, start, limit)))
}

async fn create_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreatePrint>, AppError>,
) -> AppResult<(StatusCode, Json<Print>)> {
    if let Some(printer_id) = body.printer_id {
        if PrinterRepository::find_with_archived(&state.db, user.id, printer_id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest(format!("Unknown printer {}", printer_id)));
        }
    }

    let print = PrintRepository::create(&state.db, user.id, body).await?;
    Ok((StatusCode::CREATED, Json(print)))
}

async fn get_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<Print>> {
    PrintRepository::find(&state.db, user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Print"))
}

async fn update_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdatePrint>, AppError>,
) -> AppResult<Json<Print>> {
    PrintRepository::update(&state.db, user.id, id, body)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Print"))
}

async fn delete_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<StatusCode> {
    if !PrintRepository::delete(&state.db, user.id, id).await? {
        return Err(AppError::not_found("Print"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ids the caller does not own are skipped without error.
async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<BulkDeleteRequest>, AppError>,
) -> AppResult<StatusCode> {
    let deleted = PrintRepository::delete_many(&state.db, user.id, &body.print_ids).await?;
    tracing::info!(
        "User {} bulk-deleted {} of {} prints",
        user.id,
        deleted,
        body.print_ids.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Legacy GET form: the first review of a print's alert credits the user.
async fn tag_alert_legacy(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<AlertOverwriteQuery>, AppError>,
) -> AppResult<Json<TagAlertResponse>> {
    let user_credited =
        PrintService::tag_alert(&state, user.id, id, query.value.as_deref()).await?;
    Ok(Json(TagAlertResponse { user_credited }))
}

async fn set_alert_overwrite(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<AlertOverwriteRequest>, AppError>,
) -> AppResult<Json<Print>> {
    PrintRepository::set_alert_overwrite(&state.db, user.id, id, body.value.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Print"))
}
