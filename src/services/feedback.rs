use chrono::Utc;
use serde::Serialize;

use crate::db::models::{FeedbackAnswer, FeedbackState, PrintShotFeedback};
use crate::db::repository::{PrintRepository, PrintShotFeedbackRepository};
use crate::error::{AppError, AppResult};
use crate::services::credits::{
    enqueue_credit, focused_feedback_correlation, focused_feedback_description,
    CreditContribution, CONTRIBUTION_AMOUNT, REPORTED_CREDITED_DHS,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AnsweredFeedback {
    pub instance: PrintShotFeedback,
    pub credited_dhs: i64,
}

pub struct FeedbackService;

impl FeedbackService {
    /// Record the user's answer for one print shot.
    ///
    /// The user is credited when this call answers their last pending row.
    /// Everything runs in one transaction that opens with a write, so two
    /// concurrent answers cannot both observe "last one" and the credit task
    /// commits or rolls back with the answer.
    pub async fn answer(
        state: &AppState,
        user_id: i64,
        id: i64,
        answer: FeedbackAnswer,
    ) -> AppResult<AnsweredFeedback> {
        let mut tx = state.db.begin().await?;

        if !PrintShotFeedbackRepository::touch(&mut *tx, user_id, id).await? {
            return Err(AppError::not_found("Print shot feedback"));
        }

        let previous = PrintShotFeedbackRepository::find(&mut *tx, user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Print shot feedback"))?
            .state();

        // Re-answering keeps the original answer time.
        let (transitioned, answered_at) = match previous {
            FeedbackState::Pending => (true, Utc::now().naive_utc()),
            FeedbackState::Answered { at, .. } => (false, at),
        };

        let instance =
            PrintShotFeedbackRepository::set_answer(&mut *tx, user_id, id, answer, answered_at)
                .await?
                .ok_or_else(|| AppError::not_found("Print shot feedback"))?;

        let remaining = PrintShotFeedbackRepository::count_unanswered(&mut *tx, user_id).await?;
        let should_credit = transitioned && remaining == 0;

        if should_credit {
            let print = PrintRepository::find(&mut *tx, user_id, instance.print_id)
                .await?
                .ok_or_else(|| AppError::not_found("Print"))?;

            let contribution = CreditContribution {
                user_id,
                amount: CONTRIBUTION_AMOUNT,
                description: focused_feedback_description(&print.filename),
                correlation: focused_feedback_correlation(print.id),
            };
            enqueue_credit(&mut *tx, &state.config.task_queue, &contribution).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Feedback {} answered by user {} (transitioned={}, remaining={})",
            id,
            user_id,
            transitioned,
            remaining
        );

        Ok(AnsweredFeedback {
            instance,
            credited_dhs: if should_credit { REPORTED_CREDITED_DHS } else { 0 },
        })
    }
}
