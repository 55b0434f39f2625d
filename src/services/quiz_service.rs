use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::dto::lecturer_dto::{CreateQuizPayload, UpdateQuizPayload};
use crate::error::Result;
use crate::models::quiz::Quiz;
use crate::models::user::Role;
use crate::services::api_client::ApiClient;
use crate::services::auth_service::AuthSession;

#[derive(Debug, Deserialize)]
struct Ack {
    #[serde(default)]
    message: Option<String>,
}

/// Lecturer quiz management. Only constructible from a lecturer session.
#[derive(Clone)]
pub struct QuizService {
    api: ApiClient,
}

impl QuizService {
    pub fn new(api: &ApiClient, session: &AuthSession) -> Result<Self> {
        session.require_role(&[Role::Lecturer])?;
        Ok(Self {
            api: api.with_session(session),
        })
    }

    pub async fn list_quizzes(&self) -> Result<Vec<Quiz>> {
        self.api.get("quizzes").await
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        self.api.get(&format!("quizzes/{}", quiz_id)).await
    }

    pub async fn create_quiz(&self, payload: CreateQuizPayload) -> Result<Quiz> {
        payload.validate()?;
        let quiz: Quiz = self.api.post("quizzes", &payload).await?;
        info!(quiz_id = %quiz.id, title = %quiz.title, "Quiz created");
        Ok(quiz)
    }

    pub async fn update_quiz(&self, quiz_id: &str, payload: UpdateQuizPayload) -> Result<Quiz> {
        payload.validate()?;
        let quiz: Quiz = self.api.put(&format!("quizzes/{}", quiz_id), &payload).await?;
        info!(quiz_id, "Quiz updated");
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, quiz_id: &str) -> Result<()> {
        self.api.delete(&format!("quizzes/{}", quiz_id)).await?;
        info!(quiz_id, "Quiz deleted");
        Ok(())
    }

    /// Releases scores to students. Returns the server's confirmation text.
    pub async fn publish_results(&self, quiz_id: &str) -> Result<String> {
        let ack: Ack = self
            .api
            .put_empty(&format!("quizzes/{}/publish-results", quiz_id))
            .await?;
        info!(quiz_id, "Results published");
        Ok(ack
            .message
            .unwrap_or_else(|| "Results published successfully".to_string()))
    }
}
