use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use quiz_client::config::Config;
use quiz_client::dto::auth_dto::{LoginRequest, RegisterStudentPayload};
use quiz_client::models::results::AttemptResults;
use quiz_client::models::user::Role;
use quiz_client::services::auth_service::AuthSession;
use quiz_client::services::grading_service::{GradingService, OptionMark};
use quiz_client::services::student_quiz_service::AttemptApi;
use quiz_client::utils::time::short_datetime;
use quiz_client::QuizClient;

mod lecturer;
mod take;

#[derive(Parser, Debug)]
#[command(version, about = "Take and manage timed quizzes from the terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        username: String,
        #[arg(long, env = "QUIZ_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a student account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "QUIZ_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        registration_number: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List published quizzes
    Quizzes,
    /// Show one quiz
    Quiz { id: String },
    /// Start an attempt; with --take, go straight into it
    Start {
        quiz_id: String,
        #[arg(long)]
        take: bool,
    },
    /// Resume an attempt interactively
    Take { attempt_id: String },
    /// Show published results for an attempt
    Results { attempt_id: String },
    /// Quiz authoring and reporting
    #[command(subcommand)]
    Lecturer(lecturer::LecturerCommand),
}

pub async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let client = QuizClient::from_config(config)?;

    match cli.command {
        Command::Login { username, password } => {
            let session = client
                .auth_service
                .login(LoginRequest { username, password })
                .await?;
            session.save(&config.session_file).await?;
            println!("Logged in as {} ({})", session.user.name, session.role().as_str());
        }
        Command::Register {
            name,
            username,
            email,
            password,
            registration_number,
        } => {
            let payload = RegisterStudentPayload {
                name,
                username,
                email,
                confirm_password: password.clone(),
                password,
                registration_number,
                role: Role::Student,
            };
            let session = client.auth_service.register_student(payload).await?;
            session.save(&config.session_file).await?;
            println!("Registered and logged in as {}", session.user.username);
        }
        Command::Logout => {
            AuthSession::clear(&config.session_file).await?;
            println!("Logged out");
        }
        Command::Quizzes => {
            let session = require_session(config, Role::Student).await?;
            let quizzes = client.student(&session).list_published_quizzes().await?;
            if quizzes.is_empty() {
                println!("No quizzes are available right now.");
            }
            for quiz in quizzes {
                println!("{}  {} ({} min)", quiz.id, quiz.title, quiz.duration);
            }
        }
        Command::Quiz { id } => {
            let session = require_session(config, Role::Student).await?;
            let quiz = client.student(&session).get_quiz_details(&id).await?;
            println!("{}\n{}", quiz.title, quiz.description);
            println!(
                "{} questions, {} points, {} minutes",
                quiz.questions.len(),
                quiz.total_points(),
                quiz.duration
            );
        }
        Command::Start { quiz_id, take } => {
            let session = require_session(config, Role::Student).await?;
            let attempt_id = client.student(&session).start_attempt(&quiz_id).await?;
            println!("Attempt {} started", attempt_id);
            if take {
                take::run(&client, &session, config, &attempt_id).await?;
            }
        }
        Command::Take { attempt_id } => {
            let session = require_session(config, Role::Student).await?;
            take::run(&client, &session, config, &attempt_id).await?;
        }
        Command::Results { attempt_id } => {
            let session = require_session(config, Role::Student).await?;
            let results = client.student(&session).fetch_results(&attempt_id).await?;
            print_results(&results);
        }
        Command::Lecturer(command) => {
            let session = require_session(config, Role::Lecturer).await?;
            let services = client.lecturer(&session)?;
            lecturer::run(command, &services).await?;
        }
    }

    Ok(())
}

async fn require_session(config: &Config, role: Role) -> anyhow::Result<AuthSession> {
    let session = AuthSession::load(&config.session_file)
        .await?
        .context("Not logged in; run `quiz-client login <username>` first")?;
    session.ensure_valid(Utc::now())?;
    session.require_role(&[role])?;
    Ok(session)
}

pub(crate) fn print_results(results: &AttemptResults) {
    let graded = match results {
        AttemptResults::Pending => {
            println!("Your submission was recorded. Results have not been published yet.");
            return;
        }
        AttemptResults::Published(graded) => graded,
    };

    let summary = GradingService::summarize(graded);
    println!("{}", summary.quiz_title);
    println!(
        "Score: {}/{} ({}%, {})  finished {} in {} min",
        summary.score,
        summary.max_score,
        summary.percentage,
        summary.band.as_str(),
        short_datetime(graded.end_time),
        summary.minutes_taken
    );
    println!("{} of {} correct", summary.correct_count(), summary.verdicts.len());

    for (idx, (verdict, answer)) in summary.verdicts.iter().zip(&graded.answers).enumerate() {
        let status = if verdict.is_correct { "correct" } else { "incorrect" };
        println!("\n{}. {} [{}, {} pt]", idx + 1, verdict.question_text, status, verdict.points);
        for ((_, mark), option) in verdict.marks.iter().zip(&answer.question.options) {
            let tag = match mark {
                OptionMark::SelectedCorrect => "+ your answer",
                OptionMark::SelectedIncorrect => "- your answer",
                OptionMark::MissedCorrect => "  correct answer",
                OptionMark::Neutral => "",
            };
            println!("   {} {}", option.text, tag);
        }
    }
}

fn write_export(path: &PathBuf, body: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {} bytes to {}", body.len(), path.display());
    Ok(())
}
