pub mod api_client;
pub mod auth_service;
pub mod grading_service;
pub mod question_service;
pub mod quiz_service;
pub mod results_service;
pub mod student_quiz_service;
pub mod user_service;
