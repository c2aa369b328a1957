use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;

use crate::db::{CreatePrinter, Printer, PrinterRepository, UpdatePrinter};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::printers::{CommandOutcome, PrinterResponse, PrinterService};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_printers).post(create_printer))
        .route(
            "/:id",
            get(get_printer)
                .patch(update_printer)
                .put(update_printer)
                .delete(archive_printer),
        )
        .route("/:id/cancel_print", get(cancel_print))
        .route("/:id/pause_print", get(pause_print))
        .route("/:id/resume_print", get(resume_print))
        .route("/:id/mute_current_print", get(mute_current_print))
        .route("/:id/acknowledge_alert", get(acknowledge_alert))
        .route("/:id/send_command", post(send_command))
        .route("/:id/status_stream", get(status_stream))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    #[serde(flatten)]
    pub outcome: CommandOutcome,
    pub printer: PrinterResponse,
}

#[derive(Debug, Deserialize)]
pub struct MuteQuery {
    pub mute_alert: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeQuery {
    pub alert_overwrite: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendCommandRequest {
    pub cmd: String,
    pub args: Value,
}

/// `mute_alert=true` in any letter case mutes; everything else unmutes.
fn parse_mute(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Lookups
// ============================================================================

/// Owned printer including archived ones; command endpoints use this view.
async fn current_printer_or_404(state: &AppState, user_id: i64, id: i64) -> AppResult<Printer> {
    PrinterRepository::find_with_archived(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Printer"))
}

/// Reload the printer after a command and build the response.
async fn command_response(
    state: &AppState,
    user_id: i64,
    printer_id: i64,
    outcome: CommandOutcome,
) -> AppResult<Json<CommandResponse>> {
    state.notifier.notify(printer_id);

    let printer = current_printer_or_404(state, user_id, printer_id).await?;
    Ok(Json(CommandResponse {
        outcome,
        printer: PrinterResponse::load(&state.db, printer).await?,
    }))
}

// ============================================================================
// CRUD Handlers
// ============================================================================

async fn list_printers(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<PrinterResponse>>> {
    let printers = PrinterRepository::list_live(&state.db, user.id).await?;

    let mut response = Vec::with_capacity(printers.len());
    for printer in printers {
        response.push(PrinterResponse::load(&state.db, printer).await?);
    }
    Ok(Json(response))
}

async fn create_printer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreatePrinter>, AppError>,
) -> AppResult<(StatusCode, Json<PrinterResponse>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Printer name must not be empty".to_string()));
    }

    let printer = PrinterRepository::create(&state.db, user.id, body).await?;
    tracing::info!("User {} created printer {}", user.id, printer.id);

    Ok((
        StatusCode::CREATED,
        Json(PrinterResponse::load(&state.db, printer).await?),
    ))
}

async fn get_printer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<PrinterResponse>> {
    let printer = PrinterRepository::find_live(&state.db, user.id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Printer"))?;
    Ok(Json(PrinterResponse::load(&state.db, printer).await?))
}

/// Apply the allow-listed settings, then tell the device whether to keep
/// watching.
async fn update_printer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdatePrinter>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    if PrinterRepository::update_live(&state.db, user.id, id, &body).await? == 0 {
        return Err(AppError::not_found("Printer"));
    }

    let printer = current_printer_or_404(&state, user.id, id).await?;
    PrinterService::send_should_watch_status(&state.db, &printer).await?;

    command_response(&state, user.id, id, CommandOutcome::new(true, false)).await
}

async fn archive_printer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<StatusCode> {
    if !PrinterRepository::archive(&state.db, user.id, id).await? {
        return Err(AppError::not_found("Printer"));
    }

    // An archived printer must stop streaming.
    let printer = current_printer_or_404(&state, user.id, id).await?;
    PrinterService::send_should_watch_status(&state.db, &printer).await?;
    state.notifier.notify(id);

    tracing::info!("User {} archived printer {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Command Handlers
// ============================================================================

async fn cancel_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let outcome = PrinterService::cancel_print(&state, &printer).await?;
    command_response(&state, user.id, id, outcome).await
}

async fn pause_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let outcome = PrinterService::pause_print(&state, &printer).await?;
    command_response(&state, user.id, id, outcome).await
}

async fn resume_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let outcome = PrinterService::resume_print(&state, &printer).await?;
    command_response(&state, user.id, id, outcome).await
}

async fn mute_current_print(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<MuteQuery>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let mute = parse_mute(query.mute_alert.as_deref());
    let outcome = PrinterService::mute_current_print(&state, &printer, mute).await?;
    command_response(&state, user.id, id, outcome).await
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<AcknowledgeQuery>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let acknowledged =
        PrinterService::acknowledge_alert(&state, &printer, query.alert_overwrite.as_deref())
            .await?;
    command_response(
        &state,
        user.id,
        id,
        CommandOutcome::new(acknowledged, acknowledged),
    )
    .await
}

/// Forward a raw command to the device. `cmd` and `args` are both required.
async fn send_command(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<SendCommandRequest>, AppError>,
) -> AppResult<Json<CommandResponse>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    PrinterService::send_octoprint_command(&state.db, &printer, &body.cmd, &body.args).await?;
    command_response(&state, user.id, id, CommandOutcome::new(true, false)).await
}

// ============================================================================
// Status Stream
// ============================================================================

/// Server-sent events, one `status` event per change of this printer.
async fn status_stream(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<i64>, AppError>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let printer = current_printer_or_404(&state, user.id, id).await?;
    let printer_id = printer.id;

    let stream = BroadcastStream::new(state.notifier.subscribe()).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.printer_id == printer_id => {
                Some(Event::default().event("status").json_data(event))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Status stream for printer {} lagged: {}", printer_id, e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
