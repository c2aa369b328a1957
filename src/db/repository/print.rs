use chrono::{NaiveDateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use crate::db::models::{CreatePrint, Print, PrintFilter, PrintSorting, UpdatePrint};
use crate::error::{AppError, AppResult};

const PRINT_COLUMNS: &str = r#"
    id, user_id, printer_id, filename,
    started_at, finished_at, cancelled_at,
    alerted_at, alert_acknowledged_at, alert_muted_at, paused_at,
    video_url, tagged_video_url, poster_url, alert_overwrite,
    created_at, updated_at
"#;

// ============================================================================
// Print Repository
// ============================================================================

pub struct PrintRepository;

impl PrintRepository {
    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        id: i64,
    ) -> AppResult<Option<Print>> {
        let sql = format!(
            "SELECT {} FROM prints WHERE id = ? AND user_id = ?",
            PRINT_COLUMNS
        );
        sqlx::query_as::<_, Print>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)
    }

    /// Every print with a video that matches `filter`, fully materialized in
    /// `sorting` order. Callers slice the result themselves: an OFFSET/LIMIT
    /// clause on this query shape is dramatically slower on large tables.
    pub async fn list_with_video(
        pool: &SqlitePool,
        user_id: i64,
        filter: PrintFilter,
        sorting: PrintSorting,
    ) -> AppResult<Vec<Print>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
        qb.push(PRINT_COLUMNS);
        qb.push(" FROM prints WHERE user_id = ");
        qb.push_bind(user_id);
        qb.push(" AND video_url IS NOT NULL");

        match filter {
            PrintFilter::All => {}
            PrintFilter::Cancelled => {
                qb.push(" AND cancelled_at IS NOT NULL");
            }
            PrintFilter::Finished => {
                qb.push(" AND finished_at IS NOT NULL");
            }
            PrintFilter::NeedAlertOverwrite => {
                qb.push(" AND alert_overwrite IS NULL AND tagged_video_url IS NOT NULL");
            }
            PrintFilter::NeedPrintShotFeedback => {
                // EXISTS keeps each print once no matter how many rows are pending.
                qb.push(
                    " AND EXISTS (SELECT 1 FROM print_shot_feedbacks f \
                     WHERE f.print_id = prints.id AND f.answered_at IS NULL)",
                );
            }
        }

        qb.push(match sorting {
            PrintSorting::DateAsc => " ORDER BY id ASC",
            PrintSorting::DateDesc => " ORDER BY id DESC",
        });

        qb.build_query_as::<Print>()
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn create(pool: &SqlitePool, user_id: i64, print: CreatePrint) -> AppResult<Print> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            INSERT INTO prints (
                user_id, printer_id, filename, started_at,
                video_url, tagged_video_url, poster_url,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PRINT_COLUMNS
        );
        sqlx::query_as::<_, Print>(&sql)
            .bind(user_id)
            .bind(print.printer_id)
            .bind(print.filename)
            .bind(now)
            .bind(print.video_url)
            .bind(print.tagged_video_url)
            .bind(print.poster_url)
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
        update: UpdatePrint,
    ) -> AppResult<Option<Print>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE prints
            SET filename = COALESCE(?, filename), updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING {}
            "#,
            PRINT_COLUMNS
        );
        sqlx::query_as::<_, Print>(&sql)
            .bind(update.filename)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Bump `updated_at` on an owned print. Used as the first statement of a
    /// transaction so the write lock is held before anything is read.
    pub async fn touch(executor: impl SqliteExecutor<'_>, user_id: i64, id: i64) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query("UPDATE prints SET updated_at = ? WHERE id = ? AND user_id = ?")
            .bind(now)
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_alert_overwrite(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        id: i64,
        value: Option<&str>,
    ) -> AppResult<Option<Print>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE prints
            SET alert_overwrite = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING {}
            "#,
            PRINT_COLUMNS
        );
        sqlx::query_as::<_, Print>(&sql)
            .bind(value)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)
    }

    /// Acknowledge a raised, not yet acknowledged alert. The condition lives in
    /// the statement so concurrent acknowledgements cannot both succeed.
    /// A `None` overwrite keeps the current value.
    pub async fn acknowledge_alert(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        alert_overwrite: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE prints
            SET alert_acknowledged_at = ?,
                alert_overwrite = COALESCE(?, alert_overwrite),
                updated_at = ?
            WHERE id = ? AND alerted_at IS NOT NULL AND alert_acknowledged_at IS NULL
            "#,
        )
        .bind(now)
        .bind(alert_overwrite)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_paused_at(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        paused_at: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE prints SET paused_at = ?, updated_at = ? WHERE id = ?")
            .bind(paused_at)
            .bind(now)
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn set_alert_muted_at(
        executor: impl SqliteExecutor<'_>,
        id: i64,
        muted_at: Option<NaiveDateTime>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE prints SET alert_muted_at = ?, updated_at = ? WHERE id = ?")
            .bind(muted_at)
            .bind(now)
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM prints WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the subset of `ids` owned by `user_id`; other ids are ignored.
    ///
    /// The ids travel as one JSON array bind, so the list length is not
    /// bounded by SQLite's host parameter limit.
    pub async fn delete_many(pool: &SqlitePool, user_id: i64, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids_json = serde_json::to_string(ids).map_err(|e| AppError::Internal(e.into()))?;

        let result = sqlx::query(
            r#"
            DELETE FROM prints
            WHERE user_id = ? AND id IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(user_id)
        .bind(ids_json)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
