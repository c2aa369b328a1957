use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{safe_filename, CreateGCodeFile, GCodeFile, UpdateGCodeFile};
use crate::error::{AppError, AppResult};

const GCODE_FILE_COLUMNS: &str =
    "id, user_id, filename, safe_filename, url, num_bytes, created_at, updated_at";

// ============================================================================
// GCode File Repository
// ============================================================================

pub struct GCodeFileRepository;

impl GCodeFileRepository {
    /// Newest first.
    pub async fn list(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<GCodeFile>> {
        let sql = format!(
            "SELECT {} FROM gcode_files WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            GCODE_FILE_COLUMNS
        );
        sqlx::query_as::<_, GCodeFile>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<Option<GCodeFile>> {
        let sql = format!(
            "SELECT {} FROM gcode_files WHERE id = ? AND user_id = ?",
            GCODE_FILE_COLUMNS
        );
        sqlx::query_as::<_, GCodeFile>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        file: CreateGCodeFile,
    ) -> AppResult<GCodeFile> {
        let now = Utc::now().naive_utc();
        let safe = safe_filename(&file.filename);
        let sql = format!(
            r#"
            INSERT INTO gcode_files (user_id, filename, safe_filename, url, num_bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            GCODE_FILE_COLUMNS
        );
        sqlx::query_as::<_, GCodeFile>(&sql)
            .bind(user_id)
            .bind(file.filename)
            .bind(safe)
            .bind(file.url)
            .bind(file.num_bytes)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: i64,
        id: i64,
        update: UpdateGCodeFile,
    ) -> AppResult<Option<GCodeFile>> {
        let now = Utc::now().naive_utc();
        let safe = update.filename.as_deref().map(safe_filename);
        let sql = format!(
            r#"
            UPDATE gcode_files
            SET filename = COALESCE(?, filename),
                safe_filename = COALESCE(?, safe_filename),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING {}
            "#,
            GCODE_FILE_COLUMNS
        );
        sqlx::query_as::<_, GCodeFile>(&sql)
            .bind(update.filename)
            .bind(safe)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM gcode_files WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
