use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::quiz::Quiz;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub quiz: Quiz,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub answers: Vec<AttemptAnswer>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub is_score_published: bool,
    #[serde(default)]
    pub submission_reason: Option<SubmissionReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
    pub question_id: String,
    #[serde(default)]
    pub selected_options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionReason {
    Manual,
    TimeExpired,
    AwayTooLong,
}

impl SubmissionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionReason::Manual => "manual",
            SubmissionReason::TimeExpired => "time_expired",
            SubmissionReason::AwayTooLong => "away_too_long",
        }
    }

    pub fn is_automatic(&self) -> bool {
        !matches!(self, SubmissionReason::Manual)
    }

    /// Message shown alongside the results view; manual submissions have none.
    pub fn explanation(&self) -> Option<&'static str> {
        match self {
            SubmissionReason::Manual => None,
            SubmissionReason::TimeExpired => {
                Some("Your quiz was automatically submitted because the time expired.")
            }
            SubmissionReason::AwayTooLong => Some(
                "Your quiz was automatically submitted because you were away from the quiz for more than 3 minutes.",
            ),
        }
    }
}

impl std::fmt::Display for SubmissionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwayAction {
    Start,
    End,
}

/// Lecturer-side row for a quiz's attempt list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub student: StudentRef,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_score_published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub registration_number: Option<String>,
}

impl AttemptRecord {
    pub fn percentage(&self) -> Option<u32> {
        match (self.score, self.max_score) {
            (Some(score), Some(max)) if max > 0.0 => Some(((score / max) * 100.0).round() as u32),
            _ => None,
        }
    }
}
