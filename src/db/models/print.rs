use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Print {
    pub id: i64,
    pub user_id: i64,
    pub printer_id: Option<i64>,
    pub filename: String,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub alerted_at: Option<NaiveDateTime>,
    pub alert_acknowledged_at: Option<NaiveDateTime>,
    pub alert_muted_at: Option<NaiveDateTime>,
    pub paused_at: Option<NaiveDateTime>,
    pub video_url: Option<String>,
    pub tagged_video_url: Option<String>,
    pub poster_url: Option<String>,
    pub alert_overwrite: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// How a print ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    InProgress,
    Finished(NaiveDateTime),
    Cancelled(NaiveDateTime),
}

/// Whether the user has reviewed the automatic alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReview<'a> {
    Pending,
    Reviewed(&'a str),
}

impl Print {
    pub fn outcome(&self) -> PrintOutcome {
        match (self.cancelled_at, self.finished_at) {
            (Some(at), _) => PrintOutcome::Cancelled(at),
            (None, Some(at)) => PrintOutcome::Finished(at),
            (None, None) => PrintOutcome::InProgress,
        }
    }

    pub fn alert_review(&self) -> AlertReview<'_> {
        match self.alert_overwrite.as_deref() {
            Some(value) => AlertReview::Reviewed(value),
            None => AlertReview::Pending,
        }
    }

    /// An alert was raised and the user has not acknowledged it yet.
    pub fn has_unacknowledged_alert(&self) -> bool {
        self.alerted_at.is_some() && self.alert_acknowledged_at.is_none()
    }
}

/// Labels written into `alert_overwrite` when an alert is resolved through a
/// printer command rather than an explicit review.
pub const ALERT_FAILED: &str = "FAILED";
pub const ALERT_NOT_FAILED: &str = "NOT_FAILED";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePrint {
    pub filename: String,
    pub printer_id: Option<i64>,
    pub video_url: Option<String>,
    pub tagged_video_url: Option<String>,
    pub poster_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrint {
    pub filename: Option<String>,
}

/// Narrowing applied by the print listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintFilter {
    All,
    Cancelled,
    Finished,
    NeedAlertOverwrite,
    NeedPrintShotFeedback,
}

impl PrintFilter {
    /// Unknown values do not narrow the listing.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("cancelled") => PrintFilter::Cancelled,
            Some("finished") => PrintFilter::Finished,
            Some("need_alert_overwrite") => PrintFilter::NeedAlertOverwrite,
            Some("need_print_shot_feedback") => PrintFilter::NeedPrintShotFeedback,
            _ => PrintFilter::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSorting {
    DateAsc,
    DateDesc,
}

impl PrintSorting {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("date_asc") => PrintSorting::DateAsc,
            _ => PrintSorting::DateDesc,
        }
    }
}
