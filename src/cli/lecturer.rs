use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;

use quiz_client::dto::lecturer_dto::{
    BulkQuestionRow, CreateQuestionPayload, CreateQuizPayload, ExportFormat, OptionPayload, UpdateQuizPayload,
};
use quiz_client::models::question::QuestionType;
use quiz_client::services::results_service::average_percentage;
use quiz_client::utils::time::short_datetime;
use quiz_client::LecturerServices;

#[derive(Subcommand, Debug)]
pub enum LecturerCommand {
    /// List your quizzes
    Quizzes,
    CreateQuiz {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Minutes
        #[arg(long)]
        duration: u32,
        #[arg(long)]
        publish: bool,
    },
    UpdateQuiz {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        published: Option<bool>,
    },
    DeleteQuiz { id: String },
    /// Add one question. True/false questions take --answer; multiple-choice
    /// questions take --option (repeatable) and --correct with 1-based positions.
    AddQuestion {
        quiz_id: String,
        #[arg(long)]
        text: String,
        #[arg(long = "type", default_value = "multiple-choice")]
        question_type: String,
        #[arg(long = "option")]
        options: Vec<String>,
        #[arg(long = "correct")]
        correct: Vec<usize>,
        #[arg(long)]
        answer: Option<bool>,
        #[arg(long, default_value_t = 1)]
        points: u32,
    },
    DeleteQuestion { id: String },
    /// Upload a JSON array of template rows
    UploadQuestions { quiz_id: String, file: PathBuf },
    PublishResults { quiz_id: String },
    /// List attempts for a quiz
    Attempts { quiz_id: String },
    /// Show one attempt
    Attempt { attempt_id: String },
    ExportResults {
        quiz_id: String,
        #[arg(long, value_parser = ["csv", "pdf"], default_value = "csv")]
        format: String,
        #[arg(long, short)]
        output: PathBuf,
    },
    Students {
        #[arg(long)]
        search: Option<String>,
    },
    ExportStudents {
        #[arg(long, short)]
        output: PathBuf,
    },
}

pub async fn run(command: LecturerCommand, services: &LecturerServices) -> anyhow::Result<()> {
    match command {
        LecturerCommand::Quizzes => {
            for quiz in services.quiz_service.list_quizzes().await? {
                let status = if quiz.is_published { "published" } else { "draft" };
                println!("{}  {} ({} min, {})", quiz.id, quiz.title, quiz.duration, status);
            }
        }
        LecturerCommand::CreateQuiz {
            title,
            description,
            duration,
            publish,
        } => {
            let quiz = services
                .quiz_service
                .create_quiz(CreateQuizPayload {
                    title,
                    description,
                    duration,
                    is_published: publish,
                })
                .await?;
            println!("Created quiz {}", quiz.id);
        }
        LecturerCommand::UpdateQuiz {
            id,
            title,
            description,
            duration,
            published,
        } => {
            let payload = UpdateQuizPayload {
                title,
                description,
                duration,
                is_published: published,
            };
            let quiz = services.quiz_service.update_quiz(&id, payload).await?;
            println!("Updated quiz {}", quiz.id);
        }
        LecturerCommand::DeleteQuiz { id } => {
            services.quiz_service.delete_quiz(&id).await?;
            println!("Deleted quiz {}", id);
        }
        LecturerCommand::AddQuestion {
            quiz_id,
            text,
            question_type,
            options,
            correct,
            answer,
            points,
        } => {
            let question_type: QuestionType = question_type.parse().map_err(anyhow::Error::msg)?;
            let payload = match question_type {
                QuestionType::TrueFalse => {
                    let answer = answer.context("True/false questions need --answer true|false")?;
                    CreateQuestionPayload::true_false(text, answer, points)
                }
                QuestionType::MultipleChoice => CreateQuestionPayload {
                    question_text: text,
                    question_type,
                    options: options
                        .into_iter()
                        .enumerate()
                        .map(|(idx, text)| OptionPayload {
                            text,
                            is_correct: correct.contains(&(idx + 1)),
                        })
                        .collect(),
                    points,
                },
            };
            let question = services.question_service.add_question(&quiz_id, payload).await?;
            println!("Added question {}", question.id);
        }
        LecturerCommand::DeleteQuestion { id } => {
            services.question_service.delete_question(&id).await?;
            println!("Deleted question {}", id);
        }
        LecturerCommand::UploadQuestions { quiz_id, file } => {
            let raw = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let rows: Vec<BulkQuestionRow> =
                serde_json::from_slice(&raw).context("Expected a JSON array of question rows")?;
            let report = services.question_service.bulk_upload(&quiz_id, rows).await?;

            println!(
                "Uploaded {} questions, {} failed",
                report.success_count,
                report.total_errors()
            );
            for rejected in &report.rejected {
                println!("  row {}: {}", rejected.row, rejected.message);
            }
        }
        LecturerCommand::PublishResults { quiz_id } => {
            let message = services.quiz_service.publish_results(&quiz_id).await?;
            println!("{}", message);
        }
        LecturerCommand::Attempts { quiz_id } => {
            let attempts = services.results_service.quiz_attempts(&quiz_id).await?;
            for record in &attempts {
                let score = match (record.score, record.max_score) {
                    (Some(score), Some(max)) => format!("{}/{}", score, max),
                    _ => "not graded".to_string(),
                };
                let finished = record
                    .end_time
                    .map(short_datetime)
                    .unwrap_or_else(|| "in progress".to_string());
                println!(
                    "{}  {} <{}>  {}  {}",
                    record.id, record.student.name, record.student.email, score, finished
                );
            }
            if let Some(average) = average_percentage(&attempts) {
                println!("{} attempts, average {}%", attempts.len(), average);
            }
        }
        LecturerCommand::Attempt { attempt_id } => {
            let attempt = services.results_service.attempt_details(&attempt_id).await?;
            println!("{} ({})", attempt.quiz.title, attempt.id);
            println!("Started {}", short_datetime(attempt.start_time));
            if let Some(reason) = attempt.submission_reason {
                println!("Submitted: {}", reason);
            }
            for answer in &attempt.answers {
                let text = attempt
                    .quiz
                    .question(&answer.question_id)
                    .map(|q| q.question_text.as_str())
                    .unwrap_or(answer.question_id.as_str());
                println!("  {}: {}", text, answer.selected_options.join(", "));
            }
        }
        LecturerCommand::ExportResults { quiz_id, format, output } => {
            let format = if format == "pdf" { ExportFormat::Pdf } else { ExportFormat::Csv };
            let body = services.results_service.export_results(&quiz_id, format).await?;
            super::write_export(&output, &body)?;
        }
        LecturerCommand::Students { search } => {
            let students = match search {
                Some(term) => services.user_service.search_students(&term).await?,
                None => services.user_service.list_students().await?,
            };
            for student in students {
                println!(
                    "{}  {} <{}>  {}",
                    student.username,
                    student.name,
                    student.email,
                    student.registration_number.as_deref().unwrap_or("-")
                );
            }
        }
        LecturerCommand::ExportStudents { output } => {
            let body = services.user_service.export_students().await?;
            super::write_export(&output, &body)?;
        }
    }
    Ok(())
}
