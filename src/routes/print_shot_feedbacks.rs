use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::db::{PrintShotFeedback, PrintShotFeedbackRepository, UpdatePrintShotFeedback};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::feedback::{AnsweredFeedback, FeedbackService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_feedbacks)).route(
        "/:id",
        get(get_feedback)
            .put(update_feedback)
            .patch(update_feedback),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListFeedbackQuery {
    pub print_id: Option<i64>,
}

async fn list_feedbacks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<ListFeedbackQuery>, AppError>,
) -> AppResult<Json<Vec<PrintShotFeedback>>> {
    let feedbacks = PrintShotFeedbackRepository::list(&state.db, user.id, query.print_id).await?;
    Ok(Json(feedbacks))
}

async fn get_feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<PrintShotFeedback>> {
    PrintShotFeedbackRepository::find(&state.db, user.id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Print shot feedback"))
}

/// Answer a shot. Responds with `{instance, credited_dhs}`.
async fn update_feedback(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdatePrintShotFeedback>, AppError>,
) -> AppResult<Json<AnsweredFeedback>> {
    let answered = FeedbackService::answer(&state, user.id, id, body.answer).await?;
    Ok(Json(answered))
}
