//! Initialization helpers for the application:
//! - database connection + migrations
//! - background worker spawn helpers
//!
//! This module keeps the startup plumbing out of `main.rs`.

use std::{path::Path, str::FromStr, sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::db::repository::TaskQueueRepository;
use crate::services::tasks::TaskQueue;
use crate::AppState;

/// Database URL as logged: connection parameters after `?` are dropped.
pub fn display_db_url(db_url: &str) -> &str {
    db_url.split_once('?').map_or(db_url, |(path, _)| path)
}

/// Open the SQLite pool described by `config.database` and run migrations.
///
/// For file databases the parent directory is created first.
pub async fn init_db(config: &Config) -> Result<SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", display_db_url(db_url));

    if let Some(db_path) = db_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    )
                })?;
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Spawn background workers:
/// - the task queue worker, which drains due rows from `task_queue`
///
/// Workers are spawned as `tokio::spawn` tasks. The returned `JoinHandle`s let
/// callers await shutdown. Each worker listens for a shutdown notification via
/// a `tokio::sync::broadcast::Sender<()>`.
pub fn spawn_background_workers(
    state: Arc<AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // Task queue worker
    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let cfg = state.config.task_queue.clone();
            let poll_interval = Duration::from_secs(cfg.poll_interval_seconds);
            let mut stopping = false;

            loop {
                if shutdown_rx.try_recv().is_ok() {
                    tracing::info!("Task worker received shutdown signal");
                    break;
                }

                // If the queue is disabled, sleep longer and continue.
                if !cfg.enabled {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Task worker shutting down");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                    }
                    continue;
                }

                tracing::debug!("Polling task queue for due tasks");

                match TaskQueueRepository::fetch_and_claim_due(
                    &state.db,
                    cfg.worker_concurrency as i64,
                    cfg.visibility_timeout_seconds,
                )
                .await
                {
                    Ok(tasks) => {
                        let mut in_flight = JoinSet::new();
                        let mut pending = tasks.into_iter();

                        while let Some(task) = pending.next() {
                            if shutdown_rx.try_recv().is_ok() {
                                let unstarted: Vec<String> = std::iter::once(task.id)
                                    .chain(pending.by_ref().map(|t| t.id))
                                    .collect();
                                match TaskQueueRepository::release(&state.db, &unstarted).await {
                                    Ok(n) => tracing::info!("Released {} unstarted tasks on shutdown", n),
                                    Err(e) => tracing::warn!("Failed to release unstarted tasks: {:?}", e),
                                }
                                stopping = true;
                                break;
                            }
                            let state = state.clone();
                            let cfg = cfg.clone();
                            in_flight.spawn(async move {
                                let id = task.id.clone();
                                if let Err(e) = TaskQueue::process(&state.db, &cfg, task).await {
                                    tracing::warn!("Failed to record result of task {}: {:?}", id, e);
                                }
                            });
                        }

                        // Let started handlers finish; the caller bounds the wait on shutdown.
                        while let Some(res) = in_flight.join_next().await {
                            if let Err(e) = res {
                                tracing::error!("Task handler panicked: {:?}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to fetch due tasks: {:?}", e);
                    }
                }

                if stopping {
                    tracing::info!("Task worker shutting down");
                    break;
                }

                // Wait before next poll or exit early on shutdown.
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Task worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }));
    }

    handles
}
