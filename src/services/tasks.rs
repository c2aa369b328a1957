//! Durable background tasks.
//!
//! Request handlers enqueue rows into `task_queue` (optionally inside their own
//! transaction); the worker spawned by `services::init` claims due rows and
//! hands them to `TaskQueue::process`. Delivery is at-least-once, so every
//! handler must tolerate running twice for the same task.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::config::TaskQueueConfig;
use crate::db::models::{CreateTask, Task, TASK_DEAD};
use crate::db::repository::TaskQueueRepository;
use crate::error::{AppError, AppResult};
use crate::services::credits::{CreditContributionHandler, CREDIT_DH_FOR_CONTRIBUTION};

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The payload can never be handled; retrying is pointless.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Transient(#[from] AppError),
}

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, pool: &SqlitePool, task: &Task) -> Result<(), TaskError>;
}

fn handler_for(task_name: &str) -> Option<Box<dyn TaskHandler>> {
    match task_name {
        CREDIT_DH_FOR_CONTRIBUTION => Some(Box::new(CreditContributionHandler)),
        _ => None,
    }
}

/// Delay before the next attempt after `attempts` failures:
/// `initial * 2^attempts`, capped at `max_backoff_seconds`.
pub fn backoff_seconds(cfg: &TaskQueueConfig, attempts: i32) -> u64 {
    let exp = attempts.clamp(0, 31) as u32;
    cfg.initial_backoff_seconds
        .saturating_mul(1u64 << exp)
        .min(cfg.max_backoff_seconds)
}

pub struct TaskQueue;

impl TaskQueue {
    /// Persist a task. Pass a transaction as `executor` to make the enqueue
    /// commit or roll back together with the caller's writes.
    pub async fn enqueue<P: Serialize>(
        executor: impl SqliteExecutor<'_>,
        cfg: &TaskQueueConfig,
        task_name: &str,
        payload: &P,
    ) -> AppResult<Task> {
        let payload_json =
            serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;

        let task = TaskQueueRepository::create(
            executor,
            CreateTask {
                task_name: task_name.to_string(),
                payload_json,
                max_attempts: Some(cfg.max_attempts as i32),
                next_attempt_at: None,
            },
        )
        .await?;

        tracing::debug!(task_id = %task.id, task_name, "Task enqueued");
        Ok(task)
    }

    /// Run one claimed task and record the result.
    pub async fn process(pool: &SqlitePool, cfg: &TaskQueueConfig, task: Task) -> AppResult<()> {
        let Some(handler) = handler_for(&task.task_name) else {
            tracing::error!(
                "No handler for task {} ({}); moving to dead letters",
                task.id,
                task.task_name
            );
            TaskQueueRepository::mark_dead(
                pool,
                &task.id,
                Some(format!("unknown task name: {}", task.task_name)),
            )
            .await?;
            return Ok(());
        };

        match handler.handle(pool, &task).await {
            Ok(()) => {
                TaskQueueRepository::mark_succeeded(pool, &task.id).await?;
                tracing::info!("Task {} ({}) succeeded", task.id, task.task_name);
            }
            Err(TaskError::InvalidPayload(e)) => {
                tracing::error!("Task {} has an invalid payload: {}", task.id, e);
                TaskQueueRepository::mark_dead(pool, &task.id, Some(e.to_string())).await?;
            }
            Err(TaskError::Transient(e)) => {
                let delay = backoff_seconds(cfg, task.attempts);
                let next = Utc::now().naive_utc() + Duration::seconds(delay as i64);
                let updated = TaskQueueRepository::register_attempt_and_schedule(
                    pool,
                    &task.id,
                    next,
                    Some(e.to_string()),
                )
                .await?;

                if updated.status == TASK_DEAD {
                    tracing::error!(
                        "Task {} ({}) exhausted {} attempts: {}",
                        task.id,
                        task.task_name,
                        updated.attempts,
                        e
                    );
                } else {
                    tracing::warn!(
                        "Task {} ({}) failed, retrying in {}s: {}",
                        task.id,
                        task.task_name,
                        delay,
                        e
                    );
                }
            }
        }

        Ok(())
    }

    /// Claim and process every task that is due right now. Used by tests and
    /// by callers that want to drain the queue synchronously.
    pub async fn run_due(pool: &SqlitePool, cfg: &TaskQueueConfig) -> AppResult<usize> {
        let tasks = TaskQueueRepository::fetch_and_claim_due(
            pool,
            cfg.worker_concurrency as i64,
            cfg.visibility_timeout_seconds,
        )
        .await?;
        let count = tasks.len();
        for task in tasks {
            Self::process(pool, cfg, task).await?;
        }
        Ok(count)
    }
}
