use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

const SETTING_COLUMNS: &str = r#"
    id, user_id, name, config_json, enabled,
    notify_on_failure_alert, notify_on_account_events, notify_on_print_done,
    notify_on_print_cancelled, notify_on_filament_change, notify_on_other_events,
    notify_on_heater_status, created_at, updated_at
"#;

// ============================================================================
// Notification Setting Repository
// ============================================================================

pub struct NotificationSettingRepository;

impl NotificationSettingRepository {
    pub async fn list(pool: &SqlitePool, user_id: i64) -> AppResult<Vec<NotificationSetting>> {
        let sql = format!(
            "SELECT {} FROM notification_settings WHERE user_id = ? ORDER BY name ASC",
            SETTING_COLUMNS
        );
        sqlx::query_as::<_, NotificationSetting>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find(
        pool: &SqlitePool,
        user_id: i64,
        id: i64,
    ) -> AppResult<Option<NotificationSetting>> {
        let sql = format!(
            "SELECT {} FROM notification_settings WHERE id = ? AND user_id = ?",
            SETTING_COLUMNS
        );
        sqlx::query_as::<_, NotificationSetting>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Fails with a unique violation when the user already has a setting with this name.
    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        setting: CreateNotificationSetting,
    ) -> AppResult<NotificationSetting> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            INSERT INTO notification_settings (
                user_id, name, config_json, enabled,
                notify_on_failure_alert, notify_on_account_events, notify_on_print_done,
                notify_on_print_cancelled, notify_on_filament_change, notify_on_other_events,
                notify_on_heater_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            SETTING_COLUMNS
        );
        sqlx::query_as::<_, NotificationSetting>(&sql)
            .bind(user_id)
            .bind(setting.name)
            .bind(setting.config_json)
            .bind(setting.enabled.unwrap_or(true))
            .bind(setting.notify_on_failure_alert.unwrap_or(true))
            .bind(setting.notify_on_account_events.unwrap_or(false))
            .bind(setting.notify_on_print_done.unwrap_or(false))
            .bind(setting.notify_on_print_cancelled.unwrap_or(false))
            .bind(setting.notify_on_filament_change.unwrap_or(false))
            .bind(setting.notify_on_other_events.unwrap_or(false))
            .bind(setting.notify_on_heater_status.unwrap_or(false))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn update(
        pool: &SqlitePool,
        user_id: i64,
        id: i64,
        update: UpdateNotificationSetting,
    ) -> AppResult<Option<NotificationSetting>> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            UPDATE notification_settings
            SET config_json = COALESCE(?, config_json),
                enabled = COALESCE(?, enabled),
                notify_on_failure_alert = COALESCE(?, notify_on_failure_alert),
                notify_on_account_events = COALESCE(?, notify_on_account_events),
                notify_on_print_done = COALESCE(?, notify_on_print_done),
                notify_on_print_cancelled = COALESCE(?, notify_on_print_cancelled),
                notify_on_filament_change = COALESCE(?, notify_on_filament_change),
                notify_on_other_events = COALESCE(?, notify_on_other_events),
                notify_on_heater_status = COALESCE(?, notify_on_heater_status),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            RETURNING {}
            "#,
            SETTING_COLUMNS
        );
        sqlx::query_as::<_, NotificationSetting>(&sql)
            .bind(update.config_json)
            .bind(update.enabled)
            .bind(update.notify_on_failure_alert)
            .bind(update.notify_on_account_events)
            .bind(update.notify_on_print_done)
            .bind(update.notify_on_print_cancelled)
            .bind(update.notify_on_filament_change)
            .bind(update.notify_on_other_events)
            .bind(update.notify_on_heater_status)
            .bind(now)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notification_settings WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
