use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::db::models::PrinterCommand;
use crate::error::{AppError, AppResult};

// ============================================================================
// Printer Command Repository
// ============================================================================
//
// Outbox for device commands; the device transport drains pending rows.

pub struct PrinterCommandRepository;

impl PrinterCommandRepository {
    pub async fn create(
        executor: impl SqliteExecutor<'_>,
        printer_id: i64,
        cmd: &str,
        args_json: &str,
    ) -> AppResult<PrinterCommand> {
        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, PrinterCommand>(
            r#"
            INSERT INTO printer_commands (printer_id, cmd, args_json, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, printer_id, cmd, args_json, delivered_at, created_at
            "#,
        )
        .bind(printer_id)
        .bind(cmd)
        .bind(args_json)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Undelivered commands for a printer, oldest first.
    pub async fn list_pending(pool: &SqlitePool, printer_id: i64) -> AppResult<Vec<PrinterCommand>> {
        sqlx::query_as::<_, PrinterCommand>(
            r#"
            SELECT id, printer_id, cmd, args_json, delivered_at, created_at
            FROM printer_commands
            WHERE printer_id = ? AND delivered_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(printer_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
