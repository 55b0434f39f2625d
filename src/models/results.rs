use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::question::Question;

/// What `GET /student/attempts/{id}/results` yields: either a marker that the
/// lecturer has not released scores yet, or the fully graded attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResults {
    Pending,
    Published(GradedAttempt),
}

impl AttemptResults {
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let published = value
            .get("isScorePublished")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !published {
            return Ok(AttemptResults::Pending);
        }
        Ok(AttemptResults::Published(serde_json::from_value(value)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub quiz: GradedQuizRef,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedQuizRef {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub title: String,
}

/// In graded results the server populates `questionId` with the full question,
/// including option correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    #[serde(rename = "questionId")]
    pub question: Question,
    #[serde(default)]
    pub selected_options: Vec<String>,
}
