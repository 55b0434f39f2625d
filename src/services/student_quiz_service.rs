use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::dto::student_dto::{
    AwayRequest, AwayResponse, FinalizedAttempt, SaveAnswerRequest, StartAttemptResponse, SubmitAttemptRequest,
};
use crate::error::Result;
use crate::models::attempt::{Attempt, AwayAction};
use crate::models::quiz::Quiz;
use crate::models::results::AttemptResults;
use crate::services::api_client::ApiClient;

/// The remote operations an attempt session depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptApi: Send + Sync {
    async fn fetch_attempt(&self, attempt_id: &str) -> Result<Attempt>;

    async fn save_answer(&self, attempt_id: &str, request: SaveAnswerRequest) -> Result<()>;

    async fn register_away(&self, attempt_id: &str, action: AwayAction) -> Result<AwayResponse>;

    async fn submit_attempt(&self, attempt_id: &str, request: SubmitAttemptRequest) -> Result<FinalizedAttempt>;

    async fn fetch_results(&self, attempt_id: &str) -> Result<AttemptResults>;
}

#[derive(Clone)]
pub struct StudentQuizService {
    api: ApiClient,
}

impl StudentQuizService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list_published_quizzes(&self) -> Result<Vec<Quiz>> {
        self.api.get("student/quizzes").await
    }

    pub async fn get_quiz_details(&self, quiz_id: &str) -> Result<Quiz> {
        self.api.get(&format!("student/quizzes/{}", quiz_id)).await
    }

    pub async fn start_attempt(&self, quiz_id: &str) -> Result<String> {
        let started: StartAttemptResponse = self
            .api
            .post_empty(&format!("student/quizzes/{}/start", quiz_id))
            .await?;
        info!(quiz_id, attempt_id = %started.attempt_id, "Attempt started");
        Ok(started.attempt_id)
    }
}

#[async_trait]
impl AttemptApi for StudentQuizService {
    async fn fetch_attempt(&self, attempt_id: &str) -> Result<Attempt> {
        self.api.get(&format!("student/attempts/{}", attempt_id)).await
    }

    async fn save_answer(&self, attempt_id: &str, request: SaveAnswerRequest) -> Result<()> {
        self.api
            .put_ack(&format!("student/attempts/{}/answer", attempt_id), &request)
            .await
    }

    async fn register_away(&self, attempt_id: &str, action: AwayAction) -> Result<AwayResponse> {
        self.api
            .put(&format!("student/attempts/{}/away", attempt_id), &AwayRequest { action })
            .await
    }

    async fn submit_attempt(&self, attempt_id: &str, request: SubmitAttemptRequest) -> Result<FinalizedAttempt> {
        self.api
            .put(&format!("student/attempts/{}/submit", attempt_id), &request)
            .await
    }

    async fn fetch_results(&self, attempt_id: &str) -> Result<AttemptResults> {
        let raw: JsonValue = self
            .api
            .get(&format!("student/attempts/{}/results", attempt_id))
            .await?;
        AttemptResults::from_json(raw)
    }
}
