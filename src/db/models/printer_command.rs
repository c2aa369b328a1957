use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A command waiting for the device transport. `args_json` is stored verbatim.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrinterCommand {
    pub id: i64,
    pub printer_id: i64,
    pub cmd: String,
    pub args_json: String,
    pub delivered_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
