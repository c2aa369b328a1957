use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::CreditLedgerEntry;
use crate::error::{AppError, AppResult};

// ============================================================================
// Credit Ledger Repository
// ============================================================================

pub struct CreditLedgerRepository;

impl CreditLedgerRepository {
    /// Record a grant unless one with the same key already exists.
    /// Returns true when a new row was written.
    pub async fn grant_once(
        pool: &SqlitePool,
        user_id: i64,
        amount: i64,
        description: &str,
        idempotency_key: &str,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO credit_ledger (user_id, amount, description, idempotency_key, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(description)
        .bind(idempotency_key)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<CreditLedgerEntry>> {
        sqlx::query_as::<_, CreditLedgerEntry>(
            r#"
            SELECT id, user_id, amount, description, idempotency_key, created_at
            FROM credit_ledger
            WHERE user_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn balance(pool: &SqlitePool, user_id: i64) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM credit_ledger WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
