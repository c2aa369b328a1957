use crate::db::models::AlertReview;
use crate::db::repository::PrintRepository;
use crate::error::{AppError, AppResult};
use crate::services::credits::{enqueue_credit, tag_description, CreditContribution, CONTRIBUTION_AMOUNT};
use crate::AppState;

pub struct PrintService;

impl PrintService {
    /// Legacy tagging path: the first review of a print's alert earns a
    /// credit, later calls just overwrite the value. Returns whether a credit
    /// was enqueued.
    pub async fn tag_alert(
        state: &AppState,
        user_id: i64,
        print_id: i64,
        value: Option<&str>,
    ) -> AppResult<bool> {
        let mut tx = state.db.begin().await?;

        // Take the write lock before reading the current review state.
        if !PrintRepository::touch(&mut *tx, user_id, print_id).await? {
            return Err(AppError::not_found("Print"));
        }

        let print = PrintRepository::find(&mut *tx, user_id, print_id)
            .await?
            .ok_or_else(|| AppError::not_found("Print"))?;

        let user_credited = matches!(print.alert_review(), AlertReview::Pending);
        if user_credited {
            let contribution = CreditContribution {
                user_id: print.user_id,
                amount: CONTRIBUTION_AMOUNT,
                description: tag_description(&print.filename),
                correlation: String::new(),
            };
            enqueue_credit(&mut *tx, &state.config.task_queue, &contribution).await?;
        }

        PrintRepository::set_alert_overwrite(&mut *tx, user_id, print_id, value).await?;
        tx.commit().await?;

        Ok(user_credited)
    }
}

/// `items[start..start + limit]`, clamped to the available rows.
pub fn page<T>(items: Vec<T>, start: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(start).take(limit).collect()
}
