use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const TASK_PENDING: &str = "pending";
pub const TASK_PROCESSING: &str = "processing";
pub const TASK_SUCCEEDED: &str = "succeeded";
pub const TASK_DEAD: &str = "dead";

/// A durable background task.
///
/// Rows are written by request handlers (often inside the same transaction as
/// the change that triggered them) and drained by the task worker with
/// at-least-once semantics, so handlers must be idempotent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    /// Primary key (UUID)
    pub id: String,

    /// Handler name, e.g. `credit_dh_for_contribution`
    pub task_name: String,

    /// JSON-serialized handler arguments
    pub payload_json: String,

    /// Number of attempts already made.
    pub attempts: i32,

    /// Maximum attempts permitted before moving the task to 'dead'.
    pub max_attempts: i32,

    /// Timestamp when the task becomes eligible for the next attempt.
    pub next_attempt_at: NaiveDateTime,

    /// Last error message observed when an attempt failed (if any).
    pub last_error: Option<String>,

    /// 'pending', 'processing', 'succeeded', 'dead'
    pub status: String,

    /// When the current 'processing' lease started.
    pub claimed_at: Option<NaiveDateTime>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Data required to enqueue a task. `max_attempts` and `next_attempt_at`
/// default to the repository's values when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub task_name: String,
    pub payload_json: String,
    pub max_attempts: Option<i32>,
    pub next_attempt_at: Option<NaiveDateTime>,
}
