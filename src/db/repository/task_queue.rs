use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CreateTask, Task, TASK_PENDING};
use crate::error::{AppError, AppResult};

const TASK_COLUMNS: &str = r#"
    id, task_name, payload_json, attempts, max_attempts,
    next_attempt_at, last_error, status, claimed_at, created_at, updated_at
"#;

/// Repository for the persistent task queue.
///
/// Implementation notes:
/// - `create` accepts any executor so a task can be written in the same
///   transaction as the change that caused it.
/// - Claiming uses an atomic single-statement UPDATE with a subselect:
///   `UPDATE ... WHERE id = (SELECT id FROM ... LIMIT 1) RETURNING ...`
///   This avoids a long-lived transaction and reduces contention on SQLite.
/// - A claim is a lease. A 'processing' row whose `claimed_at` is older than
///   the visibility timeout is claimed again, so a worker that dies mid-task
///   does not lose the task.
pub struct TaskQueueRepository;

impl TaskQueueRepository {
    pub async fn create(executor: impl SqliteExecutor<'_>, task: CreateTask) -> AppResult<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let next_attempt_at = task.next_attempt_at.unwrap_or(now);
        let max_attempts = task.max_attempts.unwrap_or(5);

        let sql = format!(
            r#"
            INSERT INTO task_queue (
                id, task_name, payload_json, attempts, max_attempts,
                next_attempt_at, last_error, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(task.task_name)
            .bind(task.payload_json)
            .bind(0i32) // attempts
            .bind(max_attempts)
            .bind(next_attempt_at)
            .bind::<Option<String>>(None) // last_error
            .bind(TASK_PENDING)
            .bind(now)
            .bind(now)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }

    /// Claim up to `limit` due tasks and return them, one atomic statement per task.
    ///
    /// Due means pending with `next_attempt_at` in the past, or processing
    /// with a lease older than `visibility_timeout_seconds`.
    pub async fn fetch_and_claim_due(
        pool: &SqlitePool,
        limit: i64,
        visibility_timeout_seconds: u64,
    ) -> AppResult<Vec<Task>> {
        let mut tasks: Vec<Task> = Vec::new();
        if limit <= 0 {
            return Ok(tasks);
        }

        let sql = format!(
            r#"
            UPDATE task_queue
            SET status = 'processing', claimed_at = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM task_queue
                WHERE (status = 'pending' AND next_attempt_at <= ?)
                   OR (status = 'processing' AND claimed_at <= ?)
                ORDER BY next_attempt_at ASC
                LIMIT 1
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let lease = Duration::seconds(visibility_timeout_seconds.min(i64::MAX as u64) as i64);

        for _ in 0..(limit as usize) {
            let now = Utc::now().naive_utc();

            let opt = sqlx::query_as::<_, Task>(&sql)
                .bind(now)
                .bind(now)
                .bind(now)
                .bind(now - lease)
                .fetch_optional(pool)
                .await
                .map_err(AppError::Database)?;

            if let Some(task) = opt {
                tasks.push(task);
            } else {
                break;
            }
        }

        Ok(tasks)
    }

    /// Hand claimed tasks that never started back to the queue.
    pub async fn release(pool: &SqlitePool, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids_json = serde_json::to_string(ids).map_err(|e| AppError::Internal(e.into()))?;
        let result = sqlx::query(
            r#"
            UPDATE task_queue
            SET status = 'pending', claimed_at = NULL, updated_at = ?
            WHERE status = 'processing' AND id IN (SELECT value FROM json_each(?))
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(ids_json)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    pub async fn mark_succeeded(pool: &SqlitePool, id: &str) -> AppResult<Task> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE task_queue
            SET status = 'succeeded', attempts = attempts + 1, claimed_at = NULL, updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(now)
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Increment attempts, set `next_attempt_at` and `last_error`. If the new
    /// attempt count reaches `max_attempts`, the task is moved to 'dead'.
    pub async fn register_attempt_and_schedule(
        pool: &SqlitePool,
        id: &str,
        next_attempt_at: NaiveDateTime,
        last_error: Option<String>,
    ) -> AppResult<Task> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE task_queue
            SET
                attempts = attempts + 1,
                next_attempt_at = ?,
                last_error = ?,
                status = CASE WHEN attempts + 1 >= max_attempts THEN 'dead' ELSE 'pending' END,
                claimed_at = NULL,
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(next_attempt_at)
            .bind(last_error)
            .bind(now)
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Move the task straight to 'dead', e.g. when no handler knows its name.
    pub async fn mark_dead(pool: &SqlitePool, id: &str, last_error: Option<String>) -> AppResult<Task> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE task_queue
            SET status = 'dead', last_error = ?, claimed_at = NULL, updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(last_error)
            .bind(now)
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Task>> {
        let sql = format!("SELECT {} FROM task_queue WHERE id = ?", TASK_COLUMNS);
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn list_by_name(pool: &SqlitePool, task_name: &str) -> AppResult<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM task_queue WHERE task_name = ? ORDER BY created_at ASC",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(task_name)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }
}
