use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What the device should do on its own when a failure is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOnFailure {
    None,
    Pause,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Printer {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub auth_token: String,
    pub current_print_id: Option<i64>,
    pub watching_enabled: bool,
    pub action_on_failure: ActionOnFailure,
    pub tools_off_on_pause: bool,
    pub bed_off_on_pause: bool,
    pub retract_on_pause: f64,
    pub lift_z_on_pause: f64,
    pub detective_sensitivity: f64,
    /// Soft-delete marker. Archived printers are hidden from listings but
    /// remain reachable by the command endpoints.
    pub archived_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Printer {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePrinter {
    pub name: String,
    pub watching_enabled: Option<bool>,
    pub action_on_failure: Option<ActionOnFailure>,
}

/// The complete set of printer columns a user may change through the API.
///
/// Any other key in a request body is rejected during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrinter {
    pub name: Option<String>,
    pub watching_enabled: Option<bool>,
    pub action_on_failure: Option<ActionOnFailure>,
    pub tools_off_on_pause: Option<bool>,
    pub bed_off_on_pause: Option<bool>,
    pub retract_on_pause: Option<f64>,
    pub lift_z_on_pause: Option<f64>,
    pub detective_sensitivity: Option<f64>,
}
