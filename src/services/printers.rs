use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::db::models::{Print, PrintOutcome, Printer, PrinterCommand, ALERT_FAILED, ALERT_NOT_FAILED};
use crate::db::repository::{PrintRepository, PrinterCommandRepository};
use crate::error::AppResult;
use crate::services::credits::{
    alert_ack_correlation, enqueue_credit, tag_description, CreditContribution,
    CONTRIBUTION_AMOUNT,
};
use crate::AppState;

/// Result of a printer command as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub succeeded: bool,
    pub user_credited: bool,
}

impl CommandOutcome {
    pub fn new(succeeded: bool, user_credited: bool) -> Self {
        Self {
            succeeded,
            user_credited,
        }
    }

    fn no_current_print() -> Self {
        Self::new(false, false)
    }
}

/// Printer as serialized by the API, with its running print embedded.
#[derive(Debug, Serialize)]
pub struct PrinterResponse {
    #[serde(flatten)]
    pub printer: Printer,
    pub current_print: Option<Print>,
}

impl PrinterResponse {
    pub async fn load(pool: &SqlitePool, printer: Printer) -> AppResult<Self> {
        let current_print = PrinterService::active_print(pool, &printer).await?;
        Ok(Self {
            printer,
            current_print,
        })
    }
}

/// Device state and command dispatch for one printer.
pub struct PrinterService;

impl PrinterService {
    /// The print the device is currently running, if it has not ended yet.
    pub async fn active_print(pool: &SqlitePool, printer: &Printer) -> AppResult<Option<Print>> {
        let Some(print_id) = printer.current_print_id else {
            return Ok(None);
        };
        let print = PrintRepository::find(pool, printer.user_id, print_id).await?;
        Ok(print.filter(|p| p.outcome() == PrintOutcome::InProgress))
    }

    pub async fn cancel_print(state: &AppState, printer: &Printer) -> AppResult<CommandOutcome> {
        let Some(print) = Self::active_print(&state.db, printer).await? else {
            return Ok(CommandOutcome::no_current_print());
        };

        let user_credited = Self::acknowledge(state, &print, Some(ALERT_FAILED)).await?;
        Self::send_octoprint_command(&state.db, printer, "cancel", &json!({})).await?;

        Ok(CommandOutcome::new(true, user_credited))
    }

    pub async fn pause_print(state: &AppState, printer: &Printer) -> AppResult<CommandOutcome> {
        let Some(print) = Self::active_print(&state.db, printer).await? else {
            return Ok(CommandOutcome::no_current_print());
        };

        PrintRepository::set_paused_at(&state.db, print.id, Some(Utc::now().naive_utc())).await?;

        let args = json!({
            "retract": printer.retract_on_pause,
            "lift_z": printer.lift_z_on_pause,
            "tools_off": printer.tools_off_on_pause,
            "bed_off": printer.bed_off_on_pause,
        });
        Self::send_octoprint_command(&state.db, printer, "pause", &args).await?;

        Ok(CommandOutcome::new(true, false))
    }

    pub async fn resume_print(state: &AppState, printer: &Printer) -> AppResult<CommandOutcome> {
        let Some(print) = Self::active_print(&state.db, printer).await? else {
            return Ok(CommandOutcome::no_current_print());
        };

        PrintRepository::set_paused_at(&state.db, print.id, None).await?;
        let user_credited = Self::acknowledge(state, &print, Some(ALERT_NOT_FAILED)).await?;
        Self::send_octoprint_command(&state.db, printer, "resume", &json!({})).await?;

        Ok(CommandOutcome::new(true, user_credited))
    }

    /// Mute or unmute alerts for the running print. Reported as succeeded
    /// whether or not a print is running.
    pub async fn mute_current_print(
        state: &AppState,
        printer: &Printer,
        mute: bool,
    ) -> AppResult<CommandOutcome> {
        if let Some(print) = Self::active_print(&state.db, printer).await? {
            let muted_at = mute.then(|| Utc::now().naive_utc());
            PrintRepository::set_alert_muted_at(&state.db, print.id, muted_at).await?;
        }
        Ok(CommandOutcome::new(true, false))
    }

    /// Acknowledge the running print's alert. Returns true when an
    /// unacknowledged alert existed and this call resolved it.
    pub async fn acknowledge_alert(
        state: &AppState,
        printer: &Printer,
        alert_overwrite: Option<&str>,
    ) -> AppResult<bool> {
        let Some(print) = Self::active_print(&state.db, printer).await? else {
            return Ok(false);
        };
        Self::acknowledge(state, &print, alert_overwrite).await
    }

    async fn acknowledge(
        state: &AppState,
        print: &Print,
        alert_overwrite: Option<&str>,
    ) -> AppResult<bool> {
        if !print.has_unacknowledged_alert() {
            return Ok(false);
        }

        let mut tx = state.db.begin().await?;
        let acknowledged =
            PrintRepository::acknowledge_alert(&mut *tx, print.id, alert_overwrite).await?;
        if acknowledged {
            let contribution = CreditContribution {
                user_id: print.user_id,
                amount: CONTRIBUTION_AMOUNT,
                description: tag_description(&print.filename),
                correlation: alert_ack_correlation(print.id),
            };
            enqueue_credit(&mut *tx, &state.config.task_queue, &contribution).await?;
        }
        tx.commit().await?;

        Ok(acknowledged)
    }

    /// Queue a raw command for the device transport.
    pub async fn send_octoprint_command(
        pool: &SqlitePool,
        printer: &Printer,
        cmd: &str,
        args: &Value,
    ) -> AppResult<PrinterCommand> {
        let command =
            PrinterCommandRepository::create(pool, printer.id, cmd, &args.to_string()).await?;
        tracing::debug!("Queued command {} ({}) for printer {}", command.id, cmd, printer.id);
        Ok(command)
    }

    /// Tell the device whether it should keep streaming frames for detection.
    pub async fn send_should_watch_status(
        pool: &SqlitePool,
        printer: &Printer,
    ) -> AppResult<PrinterCommand> {
        let should_watch = printer.watching_enabled && !printer.is_archived();
        Self::send_octoprint_command(
            pool,
            printer,
            "should_watch",
            &json!({ "should_watch": should_watch }),
        )
        .await
    }
}
