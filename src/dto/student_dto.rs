use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::attempt::{AttemptAnswer, AwayAction, SubmissionReason};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    pub question_id: String,
    pub selected_options: Vec<String>,
}

/// The local answers snapshot travels with the reason so the graded state is
/// exactly what the student saw at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    pub submission_reason: SubmissionReason,
    pub answers: Vec<AttemptAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwayRequest {
    pub action: AwayAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwayResponse {
    #[serde(default)]
    pub auto_submitted: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub total_away_seconds: Option<f64>,
    #[serde(default)]
    pub attempt: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    #[serde(rename = "_id", alias = "attemptId")]
    pub attempt_id: String,
}

/// What finalize returns. Kept loose: the quiz is not populated here and the
/// score is absent until grading has happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedAttempt {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub is_score_published: bool,
}
