use bytes::Bytes;
use tracing::info;

use crate::dto::lecturer_dto::ExportFormat;
use crate::error::Result;
use crate::models::attempt::{Attempt, AttemptRecord};
use crate::models::user::Role;
use crate::services::api_client::ApiClient;
use crate::services::auth_service::AuthSession;

#[derive(Clone)]
pub struct ResultsService {
    api: ApiClient,
}

impl ResultsService {
    pub fn new(api: &ApiClient, session: &AuthSession) -> Result<Self> {
        session.require_role(&[Role::Lecturer])?;
        Ok(Self {
            api: api.with_session(session),
        })
    }

    pub async fn quiz_attempts(&self, quiz_id: &str) -> Result<Vec<AttemptRecord>> {
        self.api.get(&format!("quizzes/{}/attempts", quiz_id)).await
    }

    pub async fn attempt_details(&self, attempt_id: &str) -> Result<Attempt> {
        self.api.get(&format!("attempts/{}", attempt_id)).await
    }

    /// The server renders the file; the bytes are returned untouched.
    pub async fn export_results(&self, quiz_id: &str, format: ExportFormat) -> Result<Bytes> {
        let body = self
            .api
            .get_bytes(&format!("quizzes/{}/export", quiz_id), &[("format", format.as_str())])
            .await?;
        info!(quiz_id, format = format.as_str(), bytes = body.len(), "Results exported");
        Ok(body)
    }
}

/// Mean percentage over the graded records, ignoring ungraded ones.
pub fn average_percentage(records: &[AttemptRecord]) -> Option<u32> {
    let graded: Vec<u32> = records.iter().filter_map(AttemptRecord::percentage).collect();
    if graded.is_empty() {
        return None;
    }
    let sum: u32 = graded.iter().sum();
    Some(((sum as f64) / (graded.len() as f64)).round() as u32)
}
