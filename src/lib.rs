pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    api_client::ApiClient, auth_service::AuthService, auth_service::AuthSession,
    question_service::QuestionService, quiz_service::QuizService, results_service::ResultsService,
    student_quiz_service::StudentQuizService, user_service::UserService,
};

/// Entry point for front-ends: one configured API client, with services
/// handed out per logged-in session.
#[derive(Clone)]
pub struct QuizClient {
    pub api: ApiClient,
    pub auth_service: AuthService,
}

impl QuizClient {
    pub fn new(api: ApiClient) -> Self {
        let auth_service = AuthService::new(api.clone());
        Self { api, auth_service }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ApiClient::from_config(config)?))
    }

    pub fn student(&self, session: &AuthSession) -> StudentQuizService {
        StudentQuizService::new(self.api.with_session(session))
    }

    pub fn lecturer(&self, session: &AuthSession) -> Result<LecturerServices> {
        Ok(LecturerServices {
            quiz_service: QuizService::new(&self.api, session)?,
            question_service: QuestionService::new(&self.api, session)?,
            results_service: ResultsService::new(&self.api, session)?,
            user_service: UserService::new(&self.api, session)?,
        })
    }
}

#[derive(Clone)]
pub struct LecturerServices {
    pub quiz_service: QuizService,
    pub question_service: QuestionService,
    pub results_service: ResultsService,
    pub user_service: UserService,
}
