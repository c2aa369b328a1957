use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Users are normally provisioned by the auth backend; this is its entry point.
    pub async fn create(pool: &SqlitePool, email: &str) -> AppResult<User> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, email, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
