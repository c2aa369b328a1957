use chrono::{NaiveDateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::db::models::{FeedbackAnswer, PrintShotFeedback};
use crate::error::{AppError, AppResult};

const FEEDBACK_COLUMNS: &str = r#"
    f.id, f.print_id, f.image_url, f.answer, f.answered_at, f.created_at, f.updated_at
"#;

// ============================================================================
// Print Shot Feedback Repository
// ============================================================================
//
// Feedback rows have no user column; ownership always goes through the print.

pub struct PrintShotFeedbackRepository;

impl PrintShotFeedbackRepository {
    pub async fn find(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        id: i64,
    ) -> AppResult<Option<PrintShotFeedback>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM print_shot_feedbacks f
            JOIN prints p ON p.id = f.print_id
            WHERE f.id = ? AND p.user_id = ?
            "#,
            FEEDBACK_COLUMNS
        );
        sqlx::query_as::<_, PrintShotFeedback>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list(
        pool: &SqlitePool,
        user_id: i64,
        print_id: Option<i64>,
    ) -> AppResult<Vec<PrintShotFeedback>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM print_shot_feedbacks f
            JOIN prints p ON p.id = f.print_id
            WHERE p.user_id = ? AND (? IS NULL OR f.print_id = ?)
            ORDER BY f.id ASC
            "#,
            FEEDBACK_COLUMNS
        );
        sqlx::query_as::<_, PrintShotFeedback>(&sql)
            .bind(user_id)
            .bind(print_id)
            .bind(print_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Feedback rows are produced by the detection pipeline, one per shot.
    pub async fn create(
        pool: &SqlitePool,
        print_id: i64,
        image_url: &str,
    ) -> AppResult<PrintShotFeedback> {
        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, PrintShotFeedback>(
            r#"
            INSERT INTO print_shot_feedbacks (print_id, image_url, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, print_id, image_url, answer, answered_at, created_at, updated_at
            "#,
        )
        .bind(print_id)
        .bind(image_url)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Bump `updated_at` on an owned row. Inside a transaction this takes
    /// SQLite's write lock before anything is read. False when not owned.
    pub async fn touch(executor: impl SqliteExecutor<'_>, user_id: i64, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE print_shot_feedbacks
            SET updated_at = ?
            WHERE id = ?
              AND print_id IN (SELECT id FROM prints WHERE user_id = ?)
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn set_answer(
        executor: impl SqliteExecutor<'_>,
        user_id: i64,
        id: i64,
        answer: FeedbackAnswer,
        answered_at: NaiveDateTime,
    ) -> AppResult<Option<PrintShotFeedback>> {
        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, PrintShotFeedback>(
            r#"
            UPDATE print_shot_feedbacks
            SET answer = ?, answered_at = ?, updated_at = ?
            WHERE id = ?
              AND print_id IN (SELECT id FROM prints WHERE user_id = ?)
            RETURNING id, print_id, image_url, answer, answered_at, created_at, updated_at
            "#,
        )
        .bind(answer)
        .bind(answered_at)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Unanswered rows across all of the user's prints.
    pub async fn count_unanswered(executor: impl SqliteExecutor<'_>, user_id: i64) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM print_shot_feedbacks f
            JOIN prints p ON p.id = f.print_id
            WHERE p.user_id = ? AND f.answered_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }
}
