use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::models::{ActionOnFailure, CreatePrinter, Printer, UpdatePrinter};
use crate::error::{AppError, AppResult};

const PRINTER_COLUMNS: &str = r#"
    id, user_id, name, auth_token, current_print_id,
    watching_enabled, action_on_failure,
    tools_off_on_pause, bed_off_on_pause, retract_on_pause, lift_z_on_pause,
    detective_sensitivity, archived_at, created_at, updated_at
"#;

// ============================================================================
// Printer Repository
// ============================================================================
//
// Two views over the table, both always scoped to the owning user:
// - live: `archived_at IS NULL`, used by listing, retrieval and updates
// - with archived: every row, used by the command endpoints

pub struct PrinterRepository;

impl PrinterRepository {
    pub async fn list_live(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Printer>> {
        let sql = format!(
            "SELECT {} FROM printers WHERE user_id = ? AND archived_at IS NULL ORDER BY id ASC",
            PRINTER_COLUMNS
        );
        sqlx::query_as::<_, Printer>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_live(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<Option<Printer>> {
        let sql = format!(
            "SELECT {} FROM printers WHERE id = ? AND user_id = ? AND archived_at IS NULL",
            PRINTER_COLUMNS
        );
        sqlx::query_as::<_, Printer>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_with_archived(
        pool: &SqlitePool,
        user_id: i64,
        id: i64,
    ) -> AppResult<Option<Printer>> {
        let sql = format!(
            "SELECT {} FROM printers WHERE id = ? AND user_id = ?",
            PRINTER_COLUMNS
        );
        sqlx::query_as::<_, Printer>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        printer: CreatePrinter,
    ) -> AppResult<Printer> {
        let now = Utc::now().naive_utc();
        let auth_token = Uuid::new_v4().simple().to_string();

        let sql = format!(
            r#"
            INSERT INTO printers (
                user_id, name, auth_token, watching_enabled, action_on_failure,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PRINTER_COLUMNS
        );
        sqlx::query_as::<_, Printer>(&sql)
            .bind(user_id)
            .bind(printer.name)
            .bind(auth_token)
            .bind(printer.watching_enabled.unwrap_or(true))
            .bind(printer.action_on_failure.unwrap_or(ActionOnFailure::Pause))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Apply an allow-listed update to a live printer. Returns the number of
    /// rows touched (0 when the printer is archived, missing or not owned).
    pub async fn update_live(
        pool: &SqlitePool,
        user_id: i64,
        id: i64,
        update: &UpdatePrinter,
    ) -> AppResult<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE printers
            SET name = COALESCE(?, name),
                watching_enabled = COALESCE(?, watching_enabled),
                action_on_failure = COALESCE(?, action_on_failure),
                tools_off_on_pause = COALESCE(?, tools_off_on_pause),
                bed_off_on_pause = COALESCE(?, bed_off_on_pause),
                retract_on_pause = COALESCE(?, retract_on_pause),
                lift_z_on_pause = COALESCE(?, lift_z_on_pause),
                detective_sensitivity = COALESCE(?, detective_sensitivity),
                updated_at = ?
            WHERE id = ? AND user_id = ? AND archived_at IS NULL
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.watching_enabled)
        .bind(update.action_on_failure)
        .bind(update.tools_off_on_pause)
        .bind(update.bed_off_on_pause)
        .bind(update.retract_on_pause)
        .bind(update.lift_z_on_pause)
        .bind(update.detective_sensitivity)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Soft-delete. Returns false when no live printer matched.
    pub async fn archive(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE printers
            SET archived_at = ?, updated_at = ?
            WHERE id = ? AND user_id = ? AND archived_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Point the printer at the print it is currently running (or none).
    pub async fn set_current_print(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        print_id: Option<i64>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE printers SET current_print_id = ?, updated_at = ? WHERE id = ?")
            .bind(print_id)
            .bind(now)
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
