use tracing::{info, warn};
use validator::Validate;

use crate::dto::lecturer_dto::{BulkQuestionRow, BulkUploadRequest, BulkUploadResponse, CreateQuestionPayload};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::user::Role;
use crate::services::api_client::ApiClient;
use crate::services::auth_service::AuthSession;

/// A template row that could not be turned into a valid question.
/// `row` is 1-based, matching spreadsheet numbering below the header.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkUploadReport {
    pub success_count: u32,
    pub error_count: u32,
    pub rejected: Vec<RowError>,
}

impl BulkUploadReport {
    pub fn total_errors(&self) -> usize {
        self.error_count as usize + self.rejected.len()
    }
}

#[derive(Clone)]
pub struct QuestionService {
    api: ApiClient,
}

impl QuestionService {
    pub fn new(api: &ApiClient, session: &AuthSession) -> Result<Self> {
        session.require_role(&[Role::Lecturer])?;
        Ok(Self {
            api: api.with_session(session),
        })
    }

    pub async fn add_question(&self, quiz_id: &str, payload: CreateQuestionPayload) -> Result<Question> {
        payload.validate()?;
        let question: Question = self
            .api
            .post(&format!("quizzes/{}/questions", quiz_id), &payload)
            .await?;
        info!(quiz_id, question_id = %question.id, "Question added");
        Ok(question)
    }

    pub async fn update_question(&self, question_id: &str, payload: CreateQuestionPayload) -> Result<Question> {
        payload.validate()?;
        self.api.put(&format!("questions/{}", question_id), &payload).await
    }

    pub async fn delete_question(&self, question_id: &str) -> Result<()> {
        self.api.delete(&format!("questions/{}", question_id)).await?;
        info!(question_id, "Question deleted");
        Ok(())
    }

    /// Sends every row that normalizes and validates; the rest are reported
    /// back without a request. Nothing is sent when no row survives.
    pub async fn bulk_upload(&self, quiz_id: &str, rows: Vec<BulkQuestionRow>) -> Result<BulkUploadReport> {
        let (questions, rejected) = prepare_rows(rows);
        for err in &rejected {
            warn!(row = err.row, message = %err.message, "Skipping bulk upload row");
        }

        if questions.is_empty() {
            if rejected.is_empty() {
                return Err(Error::BadRequest("No questions to upload".to_string()));
            }
            return Ok(BulkUploadReport {
                rejected,
                ..Default::default()
            });
        }

        let response: BulkUploadResponse = self
            .api
            .post(
                &format!("questions/{}/questions/bulk-upload", quiz_id),
                &BulkUploadRequest { questions },
            )
            .await?;
        info!(
            quiz_id,
            success = response.success_count,
            errors = response.error_count,
            skipped = rejected.len(),
            "Bulk upload finished"
        );

        Ok(BulkUploadReport {
            success_count: response.success_count,
            error_count: response.error_count,
            rejected,
        })
    }
}

pub fn prepare_rows(rows: Vec<BulkQuestionRow>) -> (Vec<CreateQuestionPayload>, Vec<RowError>) {
    let mut questions = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (idx, row) in rows.into_iter().enumerate() {
        let row_number = idx + 1;
        let payload = match row.into_payload() {
            Ok(p) => p,
            Err(message) => {
                rejected.push(RowError { row: row_number, message });
                continue;
            }
        };
        match payload.validate() {
            Ok(()) => questions.push(payload),
            Err(e) => rejected.push(RowError {
                row: row_number,
                message: e.to_string(),
            }),
        }
    }

    (questions, rejected)
}
