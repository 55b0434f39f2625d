use bytes::Bytes;
use tracing::info;

use crate::error::Result;
use crate::models::user::{Role, Student};
use crate::services::api_client::ApiClient;
use crate::services::auth_service::AuthSession;

#[derive(Clone)]
pub struct UserService {
    api: ApiClient,
}

impl UserService {
    pub fn new(api: &ApiClient, session: &AuthSession) -> Result<Self> {
        session.require_role(&[Role::Lecturer])?;
        Ok(Self {
            api: api.with_session(session),
        })
    }

    pub async fn list_students(&self) -> Result<Vec<Student>> {
        self.api.get("users/students").await
    }

    pub async fn search_students(&self, term: &str) -> Result<Vec<Student>> {
        let students = self.list_students().await?;
        Ok(filter_students(students, term))
    }

    pub async fn export_students(&self) -> Result<Bytes> {
        let body = self.api.get_bytes("users/students/export", &[]).await?;
        info!(bytes = body.len(), "Students exported");
        Ok(body)
    }
}

pub fn filter_students(students: Vec<Student>, term: &str) -> Vec<Student> {
    students.into_iter().filter(|s| s.matches(term)).collect()
}
