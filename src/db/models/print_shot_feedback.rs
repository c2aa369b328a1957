use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackAnswer {
    LooksBad,
    LooksOk,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PrintShotFeedback {
    pub id: i64,
    pub print_id: i64,
    pub image_url: String,
    pub answer: Option<FeedbackAnswer>,
    pub answered_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackState {
    Pending,
    Answered {
        answer: Option<FeedbackAnswer>,
        at: NaiveDateTime,
    },
}

impl PrintShotFeedback {
    pub fn state(&self) -> FeedbackState {
        match self.answered_at {
            Some(at) => FeedbackState::Answered {
                answer: self.answer,
                at,
            },
            None => FeedbackState::Pending,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrintShotFeedback {
    pub answer: FeedbackAnswer,
}
