use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::config::TaskQueueConfig;
use crate::db::models::Task;
use crate::db::repository::CreditLedgerRepository;
use crate::error::AppResult;
use crate::services::tasks::{TaskError, TaskHandler, TaskQueue};

pub const CREDIT_DH_FOR_CONTRIBUTION: &str = "credit_dh_for_contribution";

/// Amount granted per contribution.
pub const CONTRIBUTION_AMOUNT: i64 = 1;

/// Value reported to the client as `credited_dhs` after a credited feedback
/// answer. Differs from `CONTRIBUTION_AMOUNT`; kept until product confirms
/// which one is right.
pub const REPORTED_CREDITED_DHS: i64 = 2;

const MAX_FILENAME_CHARS: usize = 100;

/// Payload of a `credit_dh_for_contribution` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditContribution {
    pub user_id: i64,
    pub amount: i64,
    pub description: String,
    /// Identifies the contribution being rewarded. Empty for legacy grants.
    #[serde(default)]
    pub correlation: String,
}

impl CreditContribution {
    /// Ledger key that makes redelivery harmless. Contributions without a
    /// correlation fall back to the task id.
    pub fn idempotency_key(&self, task_id: &str) -> String {
        if self.correlation.is_empty() {
            format!("task:{}", task_id)
        } else {
            format!("{}:{}", self.user_id, self.correlation)
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn tag_description(filename: &str) -> String {
    format!(
        "Credit | Tag \"{}\"",
        truncate_chars(filename, MAX_FILENAME_CHARS)
    )
}

pub fn focused_feedback_description(filename: &str) -> String {
    format!(
        "Credit | Focused Feedback - \"{}\"",
        truncate_chars(filename, MAX_FILENAME_CHARS)
    )
}

pub fn focused_feedback_correlation(print_id: i64) -> String {
    format!("ff:p:{}", print_id)
}

pub fn alert_ack_correlation(print_id: i64) -> String {
    format!("aa:p:{}", print_id)
}

pub async fn enqueue_credit(
    executor: impl SqliteExecutor<'_>,
    cfg: &TaskQueueConfig,
    contribution: &CreditContribution,
) -> AppResult<Task> {
    TaskQueue::enqueue(executor, cfg, CREDIT_DH_FOR_CONTRIBUTION, contribution).await
}

pub struct CreditContributionHandler;

#[async_trait]
impl TaskHandler for CreditContributionHandler {
    async fn handle(&self, pool: &SqlitePool, task: &Task) -> Result<(), TaskError> {
        let contribution: CreditContribution = serde_json::from_str(&task.payload_json)?;
        let key = contribution.idempotency_key(&task.id);

        let granted = CreditLedgerRepository::grant_once(
            pool,
            contribution.user_id,
            contribution.amount,
            &contribution.description,
            &key,
        )
        .await?;

        if granted {
            tracing::info!(
                "Credited user {} with {} ({})",
                contribution.user_id,
                contribution.amount,
                contribution.description
            );
        } else {
            tracing::info!("Credit {} already granted, skipping", key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_truncate_filename_to_100_chars() {
        let long = "x".repeat(150);
        let desc = tag_description(&long);
        assert_eq!(desc, format!("Credit | Tag \"{}\"", "x".repeat(100)));

        let desc = focused_feedback_description("benchy.gcode");
        assert_eq!(desc, "Credit | Focused Feedback - \"benchy.gcode\"");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let name = "ü".repeat(120);
        assert_eq!(truncate_chars(&name, 100).chars().count(), 100);
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn idempotency_key_prefers_correlation() {
        let mut c = CreditContribution {
            user_id: 7,
            amount: CONTRIBUTION_AMOUNT,
            description: tag_description("a.gcode"),
            correlation: focused_feedback_correlation(3),
        };
        assert_eq!(c.idempotency_key("abc"), "7:ff:p:3");

        c.correlation.clear();
        assert_eq!(c.idempotency_key("abc"), "task:abc");
    }

    #[test]
    fn payload_without_correlation_deserializes() {
        let c: CreditContribution =
            serde_json::from_str(r#"{"user_id":1,"amount":1,"description":"d"}"#).unwrap();
        assert!(c.correlation.is_empty());
    }
}
