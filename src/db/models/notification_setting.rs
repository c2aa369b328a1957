use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-channel notification preferences. `name` identifies the channel
/// (e.g. "email", "telegram") and is unique per user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Channel-specific configuration, stored as-is.
    pub config_json: String,
    pub enabled: bool,
    pub notify_on_failure_alert: bool,
    pub notify_on_account_events: bool,
    pub notify_on_print_done: bool,
    pub notify_on_print_cancelled: bool,
    pub notify_on_filament_change: bool,
    pub notify_on_other_events: bool,
    pub notify_on_heater_status: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Omitted flags take the column defaults: enabled, alerting on failures only.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNotificationSetting {
    pub name: String,
    #[serde(default)]
    pub config_json: String,
    pub enabled: Option<bool>,
    pub notify_on_failure_alert: Option<bool>,
    pub notify_on_account_events: Option<bool>,
    pub notify_on_print_done: Option<bool>,
    pub notify_on_print_cancelled: Option<bool>,
    pub notify_on_filament_change: Option<bool>,
    pub notify_on_other_events: Option<bool>,
    pub notify_on_heater_status: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNotificationSetting {
    pub config_json: Option<String>,
    pub enabled: Option<bool>,
    pub notify_on_failure_alert: Option<bool>,
    pub notify_on_account_events: Option<bool>,
    pub notify_on_print_done: Option<bool>,
    pub notify_on_print_cancelled: Option<bool>,
    pub notify_on_filament_change: Option<bool>,
    pub notify_on_other_events: Option<bool>,
    pub notify_on_heater_status: Option<bool>,
}

/// `config_json` is opaque, but it must at least parse when non-empty.
pub fn validate_config_json(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(value)
        .map(|_| ())
        .map_err(|e| format!("config_json is not valid JSON: {}", e))
}
