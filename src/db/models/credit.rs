use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One granted reward. `idempotency_key` is unique so replayed tasks are no-ops.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub description: String,
    pub idempotency_key: String,
    pub created_at: NaiveDateTime,
}
