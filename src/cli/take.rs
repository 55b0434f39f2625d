use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use quiz_client::config::Config;
use quiz_client::error::{Error, Result};
use quiz_client::services::auth_service::AuthSession;
use quiz_client::services::student_quiz_service::AttemptApi;
use quiz_client::session::{AttemptSession, SessionOutcome, SessionSettings, TimerName, Visibility};
use quiz_client::utils::time::Clock;
use quiz_client::QuizClient;

const HELP: &str = "\
Commands:
  n / p        next / previous question
  g <n>        go to question n
  s <n>        select option n (again to deselect in multi-select mode)
  c            clear the current answer
  t            time left
  submit       submit the quiz (asks for confirmation)
  confirm      confirm submission
  cancel       keep working
  hide / show  step away from the quiz / come back
  help         this text
  quit         leave without submitting";

enum Event {
    Timer(TimerName),
    Input(Option<String>),
}

pub async fn run(client: &QuizClient, auth: &AuthSession, config: &Config, attempt_id: &str) -> anyhow::Result<()> {
    let api: Arc<dyn AttemptApi> = Arc::new(client.student(auth));
    let mut session = AttemptSession::open(
        attempt_id,
        Arc::clone(&api),
        SessionSettings::from_config(config),
        Clock::system(),
    )
    .await?;

    println!("{}", HELP);
    render(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut warned_low_time = false;

    let outcome = loop {
        let event = tokio::select! {
            timer = session.next_timer() => Event::Timer(timer),
            line = lines.next_line() => Event::Input(line?),
        };

        let result = match event {
            Event::Timer(timer) => {
                if timer == TimerName::Countdown && !warned_low_time && session.is_almost_done() {
                    warned_low_time = true;
                    println!("Less than 5 minutes left ({})", session.time_left());
                }
                session.on_timer(timer).await
            }
            Event::Input(None) => {
                println!("Input closed; the attempt stays open until the timer runs out.");
                return Ok(());
            }
            Event::Input(Some(line)) => match line.trim() {
                "quit" | "q" => {
                    println!("Leaving the attempt open. Resume with `quiz-client take {}`.", attempt_id);
                    return Ok(());
                }
                command => handle_command(&mut session, command).await,
            },
        };

        match result {
            Ok(Some(outcome)) => break outcome,
            Ok(None) => {}
            Err(e @ Error::InvalidState(_)) | Err(e @ Error::UnknownQuestion(_)) => println!("{}", e),
            Err(e) => {
                warn!(error = %e, "Quiz action failed");
                println!("{}", e);
                if e.is_recoverable() {
                    println!("Nothing was lost. Try `submit` again.");
                }
            }
        }
    };

    report(&outcome);
    match api.fetch_results(&outcome.attempt_id).await {
        Ok(results) => super::print_results(&results),
        Err(e) => warn!(error = %e, "Could not load results"),
    }
    Ok(())
}

async fn handle_command(session: &mut AttemptSession, command: &str) -> Result<Option<SessionOutcome>> {
    let (verb, arg) = match command.split_once(char::is_whitespace) {
        Some((verb, arg)) => (verb, arg.trim()),
        None => (command, ""),
    };

    match verb {
        "" => {}
        "n" => {
            session.next();
            render(session);
        }
        "p" => {
            session.previous();
            render(session);
        }
        "g" => {
            match parse_position(arg) {
                Some(index) if session.go_to(index) => {}
                _ => println!("No question {}", arg),
            }
            render(session);
        }
        "s" => {
            let Some(question) = session.current_question() else {
                return Ok(None);
            };
            let Some(option) = parse_position(arg).and_then(|i| question.options.get(i)) else {
                println!("No option {}", arg);
                return Ok(None);
            };
            let (question_id, option_id) = (question.id.clone(), option.id.clone());
            session.select_option(&question_id, &option_id)?;
            render(session);
        }
        "c" => {
            if let Some(question_id) = session.current_question().map(|q| q.id.clone()) {
                session.clear_answer(&question_id)?;
            }
            render(session);
        }
        "t" => println!("Time left: {}", session.time_left()),
        "submit" => {
            session.request_manual_submit()?;
            println!(
                "You answered {} of {} questions. Type `confirm` to submit or `cancel` to keep working.",
                session.answered_count(),
                session.question_count()
            );
        }
        "confirm" => return session.confirm_submit().await.map(Some),
        "cancel" => {
            session.cancel_submit();
            render(session);
        }
        "hide" => {
            session.set_visibility(Visibility::Hidden).await?;
            println!("Away. Come back with `show` within the time limit.");
        }
        "show" => {
            let outcome = session.set_visibility(Visibility::Visible).await?;
            if outcome.is_none() {
                render(session);
            }
            return Ok(outcome);
        }
        "help" | "?" => println!("{}", HELP),
        other => println!("Unknown command `{}`; type `help`", other),
    }
    Ok(None)
}

/// 1-based input to 0-based index.
fn parse_position(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok()?.checked_sub(1)
}

fn render(session: &AttemptSession) {
    let Some(question) = session.current_question() else {
        println!("This quiz has no questions.");
        return;
    };
    let selection = session.current_selection();

    println!(
        "\n{}  |  question {}/{}  |  {} pt  |  {} left{}",
        session.quiz_title(),
        session.current_index() + 1,
        session.question_count(),
        question.points,
        session.time_left(),
        if session.is_almost_done() { " (almost done)" } else { "" }
    );
    println!("{}", question.question_text);
    for (idx, option) in question.options.iter().enumerate() {
        let mark = if selection.contains(&option.id) { "x" } else { " " };
        println!("  [{}] {}. {}", mark, idx + 1, option.text);
    }

    let grid: Vec<String> = session
        .answered_flags()
        .iter()
        .enumerate()
        .map(|(idx, answered)| {
            let current = if idx == session.current_index() { ">" } else { "" };
            let done = if *answered { "*" } else { "" };
            format!("{}{}{}", current, idx + 1, done)
        })
        .collect();
    println!("  {}", grid.join(" "));
}

fn report(outcome: &SessionOutcome) {
    if outcome.reason.is_automatic() {
        println!(
            "\n{}",
            outcome
                .explanation
                .unwrap_or("Your quiz was submitted automatically.")
        );
    } else {
        println!("\nQuiz submitted.");
    }
}
