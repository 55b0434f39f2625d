use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use tokio_test::{assert_err, assert_ok};

use super::*;
use crate::dto::student_dto::{AwayResponse, FinalizedAttempt, SaveAnswerRequest, SubmitAttemptRequest};
use crate::error::{Error, Result};
use crate::models::attempt::{Attempt, AttemptAnswer, AwayAction, SubmissionReason};
use crate::models::question::{Question, QuestionOption, QuestionType};
use crate::models::quiz::Quiz;
use crate::models::results::AttemptResults;
use crate::services::student_quiz_service::{AttemptApi, MockAttemptApi};
use crate::utils::time::Clock;

fn started_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

fn option(id: &str) -> QuestionOption {
    QuestionOption {
        id: id.into(),
        text: id.to_uppercase(),
        is_correct: None,
    }
}

fn attempt(saved: Vec<AttemptAnswer>) -> Attempt {
    Attempt {
        id: "att-1".into(),
        quiz: Quiz {
            id: "quiz-1".into(),
            title: "Ownership".into(),
            description: "Borrowing and moves".into(),
            duration: 30,
            is_published: true,
            results_published: false,
            questions: vec![
                Question {
                    id: "q1".into(),
                    question_text: "Moves invalidate the source".into(),
                    question_type: QuestionType::TrueFalse,
                    options: vec![option("t"), option("f")],
                    points: 1,
                },
                Question {
                    id: "q2".into(),
                    question_text: "Which types are Copy?".into(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec![option("a"), option("b"), option("c")],
                    points: 2,
                },
                Question {
                    id: "q3".into(),
                    question_text: "Box<T> is Send when".into(),
                    question_type: QuestionType::MultipleChoice,
                    options: vec![option("x"), option("y")],
                    points: 1,
                },
            ],
            created_at: None,
        },
        start_time: started_at(),
        end_time: None,
        is_completed: false,
        answers: saved,
        score: None,
        max_score: None,
        is_score_published: false,
        submission_reason: None,
    }
}

fn api_error() -> Error {
    Error::Api {
        status: StatusCode::BAD_GATEWAY,
        message: "upstream unavailable".into(),
    }
}

/// Mock that serves the fixture attempt and accepts any answer save.
fn mock_api(saved: Vec<AttemptAnswer>) -> MockAttemptApi {
    let mut api = MockAttemptApi::new();
    let fixture = attempt(saved);
    api.expect_fetch_attempt()
        .withf(|id| id == "att-1")
        .returning(move |_| Ok(fixture.clone()));
    api.expect_save_answer().returning(|_, _| Ok(()));
    api
}

async fn open(api: MockAttemptApi, settings: SessionSettings, clock: Clock) -> AttemptSession {
    AttemptSession::open("att-1", Arc::new(api), settings, clock)
        .await
        .unwrap()
}

fn clock_after(secs: i64) -> Clock {
    Clock::fixed(started_at() + chrono::Duration::seconds(secs))
}

#[tokio::test(start_paused = true)]
async fn load_prepares_one_answer_per_question() {
    let saved = vec![AttemptAnswer {
        question_id: "q2".into(),
        selected_options: vec!["b".into()],
    }];
    let session = open(mock_api(saved), SessionSettings::default(), clock_after(60)).await;

    assert_eq!(session.state(), &SessionState::Active);
    assert_eq!(session.quiz_title(), "Ownership");
    assert_eq!(session.answered_flags(), vec![false, true, false]);
    assert_eq!(session.selection("q1"), Some(&[] as &[String]));
    assert_eq!(session.time_left().to_string(), "29:00");
}

#[tokio::test(start_paused = true)]
async fn load_failure_leaves_the_session_failed() {
    let mut api = MockAttemptApi::new();
    api.expect_fetch_attempt()
        .returning(|_| Err(Error::NotFound("Quiz attempt not found".into())));

    let mut session = AttemptSession::new("att-1", Arc::new(api), SessionSettings::default(), Clock::system());
    let result = session.load().await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(matches!(session.state(), SessionState::Failed(_)));
    assert!(matches!(session.select_option("q1", "t"), Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn completed_attempt_cannot_be_resumed() {
    let mut api = MockAttemptApi::new();
    let mut done = attempt(Vec::new());
    done.is_completed = true;
    api.expect_fetch_attempt().returning(move |_| Ok(done.clone()));

    let result = AttemptSession::open("att-1", Arc::new(api), SessionSettings::default(), Clock::system()).await;
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn countdown_submits_only_once_the_deadline_passes() {
    let mut api = mock_api(Vec::new());
    api.expect_submit_attempt()
        .withf(|id, request| id == "att-1" && request.submission_reason == SubmissionReason::TimeExpired)
        .times(1)
        .returning(|_, _| Ok(FinalizedAttempt::default()));

    let clock = clock_after(30 * 60 - 1);
    let mut session = open(api, SessionSettings::default(), clock.clone()).await;

    assert_eq!(session.on_timer(TimerName::Countdown).await.unwrap(), None);
    assert!(!session.time_left().is_zero());
    assert!(session.is_almost_done());
    assert!(session.is_active());

    clock.advance(chrono::Duration::seconds(2));
    let outcome = session.on_timer(TimerName::Countdown).await.unwrap().unwrap();

    assert_eq!(outcome.reason, SubmissionReason::TimeExpired);
    assert_eq!(
        outcome.explanation,
        Some("Your quiz was automatically submitted because the time expired.")
    );
    assert_eq!(session.state(), &SessionState::Terminated(SubmissionReason::TimeExpired));
    assert!(session.time_left().is_zero());
}

#[tokio::test(start_paused = true)]
async fn navigation_stays_in_range() {
    let mut session = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;

    assert!(!session.can_go_previous());
    assert!(!session.previous());
    assert!(!session.go_to(3));
    assert_eq!(session.current_index(), 0);

    assert!(session.next());
    assert!(session.next());
    assert!(!session.can_go_next());
    assert!(!session.next());
    assert_eq!(session.current_index(), 2);

    assert!(session.go_to(0));
    assert_eq!(session.current_question().map(|q| q.id.as_str()), Some("q1"));
}

#[tokio::test(start_paused = true)]
async fn answered_until_cleared() {
    let mut session = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;

    assert!(!session.is_answered("q1"));
    assert_ok!(session.select_option("q1", "t"));
    assert!(session.is_answered("q1"));
    assert_ok!(session.clear_answer("q1"));
    assert!(!session.is_answered("q1"));
    assert_eq!(session.answered_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn selection_survives_navigation() {
    let mut session = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;

    session.go_to(1);
    session.select_option("q2", "c").unwrap();
    session.go_to(2);
    assert!(session.current_selection().is_empty());
    session.go_to(1);

    assert_eq!(session.current_selection(), &["c".to_string()][..]);
}

#[tokio::test(start_paused = true)]
async fn single_select_replaces_and_multi_select_toggles() {
    let mut single = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;
    single.select_option("q2", "a").unwrap();
    single.select_option("q2", "b").unwrap();
    assert_eq!(single.selection("q2"), Some(&["b".to_string()][..]));

    let settings = SessionSettings {
        multi_select: true,
        ..Default::default()
    };
    let mut multi = open(mock_api(Vec::new()), settings, clock_after(0)).await;
    multi.select_option("q2", "a").unwrap();
    multi.select_option("q2", "b").unwrap();
    multi.select_option("q2", "a").unwrap();
    assert_eq!(multi.selection("q2"), Some(&["b".to_string()][..]));

    multi.select_option("q1", "t").unwrap();
    multi.select_option("q1", "f").unwrap();
    assert_eq!(multi.selection("q1"), Some(&["f".to_string()][..]));
}

#[tokio::test(start_paused = true)]
async fn unknown_question_or_option_is_rejected() {
    let mut session = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;

    assert!(matches!(session.select_option("nope", "t"), Err(Error::UnknownQuestion(_))));
    assert!(matches!(session.select_option("q1", "a"), Err(Error::InvalidState(_))));
    assert!(!session.is_answered("q1"));
}

#[tokio::test(start_paused = true)]
async fn save_failures_stay_local() {
    let mut api = MockAttemptApi::new();
    let fixture = attempt(Vec::new());
    api.expect_fetch_attempt().returning(move |_| Ok(fixture.clone()));
    api.expect_save_answer().returning(|_, _| Err(api_error()));
    api.expect_submit_attempt()
        .withf(|_, request| request.answers[0].selected_options == vec!["t".to_string()])
        .times(1)
        .returning(|_, _| Ok(FinalizedAttempt::default()));

    let mut session = open(api, SessionSettings::default(), clock_after(0)).await;
    session.select_option("q1", "t").unwrap();
    assert!(session.is_answered("q1"));

    session.request_manual_submit().unwrap();
    let outcome = session.confirm_submit().await.unwrap();
    assert_eq!(outcome.reason, SubmissionReason::Manual);
}

#[tokio::test(start_paused = true)]
async fn away_past_the_limit_submits_at_the_boundary() {
    let mut api = mock_api(Vec::new());
    api.expect_register_away()
        .withf(|_, action| *action == AwayAction::Start)
        .returning(|_, _| Ok(AwayResponse::default()));
    api.expect_submit_attempt()
        .withf(|_, request| request.submission_reason == SubmissionReason::AwayTooLong)
        .times(1)
        .returning(|_, _| Ok(FinalizedAttempt::default()));

    let settings = SessionSettings {
        tick: Duration::from_secs(3600),
        ..Default::default()
    };
    let mut session = open(api, settings, clock_after(60)).await;

    assert_eq!(session.set_visibility(Visibility::Hidden).await.unwrap(), None);
    assert!(session.is_hidden());
    let hidden_at = tokio::time::Instant::now();

    let timer = session.next_timer().await;
    assert_eq!(timer, TimerName::AwayFallback);
    assert!(hidden_at.elapsed() >= Duration::from_secs(180));
    assert!(hidden_at.elapsed() < Duration::from_secs(181));

    let outcome = session.on_timer(timer).await.unwrap().unwrap();
    assert_eq!(outcome.reason, SubmissionReason::AwayTooLong);
    assert!(outcome.explanation.unwrap().contains("more than 3 minutes"));
    assert_eq!(session.state(), &SessionState::Terminated(SubmissionReason::AwayTooLong));
}

#[tokio::test(start_paused = true)]
async fn coming_back_in_time_disarms_the_fallback() {
    let mut api = mock_api(Vec::new());
    api.expect_register_away().returning(|_, _| Ok(AwayResponse::default()));

    let mut session = open(api, SessionSettings::default(), clock_after(60)).await;
    session.set_visibility(Visibility::Hidden).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(session.set_visibility(Visibility::Visible).await.unwrap(), None);
    assert!(!session.is_hidden());

    // A fallback that raced the return is ignored.
    assert_eq!(session.on_timer(TimerName::AwayFallback).await.unwrap(), None);
    assert!(session.is_active());
}

#[tokio::test(start_paused = true)]
async fn server_side_auto_submit_ends_without_finalizing() {
    let mut api = mock_api(Vec::new());
    api.expect_register_away()
        .withf(|_, action| *action == AwayAction::Start)
        .returning(|_, _| Err(api_error()));
    api.expect_register_away()
        .withf(|_, action| *action == AwayAction::End)
        .returning(|_, _| {
            Ok(AwayResponse {
                auto_submitted: true,
                total_away_seconds: Some(200.0),
                ..Default::default()
            })
        });
    api.expect_submit_attempt().never();

    let mut session = open(api, SessionSettings::default(), clock_after(60)).await;
    session.set_visibility(Visibility::Hidden).await.unwrap();

    let outcome = session
        .set_visibility(Visibility::Visible)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.reason, SubmissionReason::AwayTooLong);
    assert_eq!(outcome.finalized, None);
    assert_eq!(session.state(), &SessionState::Terminated(SubmissionReason::AwayTooLong));
}

#[tokio::test(start_paused = true)]
async fn failed_submit_reverts_and_can_be_retried() {
    let mut api = mock_api(Vec::new());
    let mut calls = 0;
    api.expect_submit_attempt()
        .withf(|_, request| request.submission_reason == SubmissionReason::Manual)
        .times(2)
        .returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(api_error())
            } else {
                Ok(FinalizedAttempt {
                    id: Some("att-1".into()),
                    is_completed: true,
                    ..Default::default()
                })
            }
        });

    let mut session = open(api, SessionSettings::default(), clock_after(60)).await;

    assert_err!(session.confirm_submit().await);

    session.request_manual_submit().unwrap();
    assert!(session.is_confirming());
    let first = session.confirm_submit().await;
    assert!(first.unwrap_err().is_recoverable());
    assert_eq!(session.state(), &SessionState::Active);
    assert!(!session.is_confirming());

    session.select_option("q1", "f").unwrap();

    session.request_manual_submit().unwrap();
    let outcome = session.confirm_submit().await.unwrap();
    assert_eq!(outcome.reason, SubmissionReason::Manual);
    assert_eq!(outcome.explanation, None);
    assert!(outcome.finalized.unwrap().is_completed);

    assert!(matches!(session.select_option("q1", "t"), Err(Error::InvalidState(_))));
    assert!(matches!(session.request_manual_submit(), Err(Error::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn cancelled_confirmation_keeps_the_session_open() {
    let mut session = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(60)).await;

    assert_ok!(session.request_manual_submit());
    session.cancel_submit();

    assert!(!session.is_confirming());
    assert!(matches!(session.confirm_submit().await, Err(Error::InvalidState(_))));
    assert!(session.is_active());
}

#[tokio::test(start_paused = true)]
async fn submission_carries_the_local_snapshot_in_question_order() {
    let saved = vec![AttemptAnswer {
        question_id: "q3".into(),
        selected_options: vec!["y".into()],
    }];
    let mut api = mock_api(saved);
    api.expect_submit_attempt()
        .withf(|_, request| {
            let answers: Vec<(&str, Vec<String>)> = request
                .answers
                .iter()
                .map(|a| (a.question_id.as_str(), a.selected_options.clone()))
                .collect();
            answers
                == vec![
                    ("q1", vec!["t".to_string()]),
                    ("q2", Vec::new()),
                    ("q3", vec!["y".to_string()]),
                ]
        })
        .times(1)
        .returning(|_, _| Ok(FinalizedAttempt::default()));

    let mut session = open(api, SessionSettings::default(), clock_after(60)).await;
    session.select_option("q1", "t").unwrap();
    session.request_manual_submit().unwrap();
    session.confirm_submit().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn first_trigger_wins() {
    let mut api = mock_api(Vec::new());
    api.expect_register_away().returning(|_, _| Ok(AwayResponse::default()));
    api.expect_submit_attempt()
        .times(1)
        .returning(|_, _| Ok(FinalizedAttempt::default()));

    let clock = clock_after(60);
    let mut session = open(api, SessionSettings::default(), clock.clone()).await;
    session.set_visibility(Visibility::Hidden).await.unwrap();

    let outcome = session.on_timer(TimerName::AwayFallback).await.unwrap().unwrap();
    assert_eq!(outcome.reason, SubmissionReason::AwayTooLong);

    clock.advance(chrono::Duration::hours(1));
    assert_eq!(session.on_timer(TimerName::Countdown).await.unwrap(), None);
    assert_eq!(session.set_visibility(Visibility::Visible).await.unwrap(), None);
    assert_eq!(session.state(), &SessionState::Terminated(SubmissionReason::AwayTooLong));
}

const SLOW: Duration = Duration::from_secs(2);

/// Fake whose answer saves and away-start notices take [`SLOW`] to land.
#[derive(Default)]
struct SlowApi {
    saved: Mutex<Vec<String>>,
    away: Mutex<Vec<AwayAction>>,
}

#[async_trait]
impl AttemptApi for SlowApi {
    async fn fetch_attempt(&self, _attempt_id: &str) -> Result<Attempt> {
        Ok(attempt(Vec::new()))
    }

    async fn save_answer(&self, _attempt_id: &str, request: SaveAnswerRequest) -> Result<()> {
        tokio::time::sleep(SLOW).await;
        self.saved.lock().unwrap().push(request.question_id);
        Ok(())
    }

    async fn register_away(&self, _attempt_id: &str, action: AwayAction) -> Result<AwayResponse> {
        if action == AwayAction::Start {
            tokio::time::sleep(SLOW).await;
        }
        self.away.lock().unwrap().push(action);
        Ok(AwayResponse::default())
    }

    async fn submit_attempt(&self, _attempt_id: &str, _request: SubmitAttemptRequest) -> Result<FinalizedAttempt> {
        Ok(FinalizedAttempt::default())
    }

    async fn fetch_results(&self, _attempt_id: &str) -> Result<AttemptResults> {
        Ok(AttemptResults::Pending)
    }
}

async fn open_slow(api: &Arc<SlowApi>) -> AttemptSession {
    AttemptSession::open("att-1", Arc::clone(api) as Arc<dyn AttemptApi>, SessionSettings::default(), clock_after(60))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn away_end_is_sent_after_away_start() {
    let api = Arc::new(SlowApi::default());
    let mut session = open_slow(&api).await;

    let hidden_at = tokio::time::Instant::now();
    session.set_visibility(Visibility::Hidden).await.unwrap();
    assert_eq!(hidden_at.elapsed(), Duration::ZERO);
    assert!(session.is_hidden());

    assert_eq!(session.set_visibility(Visibility::Visible).await.unwrap(), None);
    assert_eq!(*api.away.lock().unwrap(), vec![AwayAction::Start, AwayAction::End]);
    assert!(session.is_active());
}

#[tokio::test(start_paused = true)]
async fn away_end_order_holds_with_the_mock_too() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut api = mock_api(Vec::new());
    let recorded = Arc::clone(&order);
    api.expect_register_away().returning(move |_, action| {
        recorded.lock().unwrap().push(action);
        Ok(AwayResponse::default())
    });

    let mut session = open(api, SessionSettings::default(), clock_after(60)).await;
    session.set_visibility(Visibility::Hidden).await.unwrap();
    session.set_visibility(Visibility::Visible).await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec![AwayAction::Start, AwayAction::End]);
}

#[tokio::test(start_paused = true)]
async fn set_answer_enforces_the_single_select_policy() {
    let mut single = open(mock_api(Vec::new()), SessionSettings::default(), clock_after(0)).await;
    let both = vec!["t".to_string(), "f".to_string()];

    assert!(matches!(single.set_answer("q1", both.clone()), Err(Error::InvalidState(_))));
    assert!(matches!(
        single.set_answer("q2", vec!["a".into(), "b".into()]),
        Err(Error::InvalidState(_))
    ));
    assert!(!single.is_answered("q1"));
    assert!(!single.is_answered("q2"));

    // Duplicates collapse to one option.
    assert_ok!(single.set_answer("q1", vec!["t".into(), "t".into()]));
    assert_eq!(single.selection("q1"), Some(&["t".to_string()][..]));

    let settings = SessionSettings {
        multi_select: true,
        ..Default::default()
    };
    let mut multi = open(mock_api(Vec::new()), settings, clock_after(0)).await;
    assert!(matches!(multi.set_answer("q1", both), Err(Error::InvalidState(_))));
    assert_ok!(multi.set_answer("q2", vec!["a".into(), "b".into()]));
    assert_eq!(multi.selection("q2").map(<[String]>::len), Some(2));
}

#[tokio::test(start_paused = true)]
async fn close_cancels_timers_and_late_saves_land_safely() {
    let api = Arc::new(SlowApi::default());
    let mut session = open_slow(&api).await;

    session.select_option("q1", "t").unwrap();
    session.set_visibility(Visibility::Hidden).await.unwrap();
    session.close();

    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(tokio::time::timeout(Duration::from_secs(1), session.next_timer()).await.is_err());
    assert!(session.is_active());
    assert_eq!(*api.saved.lock().unwrap(), vec!["q1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_lets_pending_saves_finish() {
    let api = Arc::new(SlowApi::default());
    let mut session = open_slow(&api).await;
    session.select_option("q2", "b").unwrap();
    drop(session);

    tokio::time::sleep(SLOW * 2).await;
    assert_eq!(*api.saved.lock().unwrap(), vec!["q2".to_string()]);
}
