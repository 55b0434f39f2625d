use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dto::student_dto::{FinalizedAttempt, SaveAnswerRequest, SubmitAttemptRequest};
use crate::error::{Error, Result};
use crate::models::attempt::{AttemptAnswer, AwayAction, SubmissionReason};
use crate::models::question::{Question, QuestionType};
use crate::services::student_quiz_service::AttemptApi;
use crate::session::countdown::{Countdown, TimeLeft};
use crate::session::scheduler::{Scheduler, TimerName};
use crate::utils::time::Clock;

const SAVE_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const AWAY_START_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub away_limit: Duration,
    pub tick: Duration,
    /// Lets multiple-choice questions hold more than one option.
    pub multi_select: bool,
    pub low_time_warning: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            away_limit: Duration::from_secs(180),
            tick: Duration::from_secs(1),
            multi_select: false,
            low_time_warning: Duration::from_secs(5 * 60),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            away_limit: config.away_limit,
            tick: config.timer_tick,
            multi_select: config.multi_select,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Active,
    Submitting(SubmissionReason),
    Terminated(SubmissionReason),
    Failed(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Loading => f.write_str("loading"),
            SessionState::Active => f.write_str("active"),
            SessionState::Submitting(reason) => write!(f, "submitting ({})", reason),
            SessionState::Terminated(reason) => write!(f, "terminated ({})", reason),
            SessionState::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// Handed back once the attempt is over. `finalized` is `None` when the
/// server had already closed the attempt on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub attempt_id: String,
    pub reason: SubmissionReason,
    pub explanation: Option<&'static str>,
    pub finalized: Option<FinalizedAttempt>,
}

impl SessionOutcome {
    fn new(attempt_id: &str, reason: SubmissionReason, finalized: Option<FinalizedAttempt>) -> Self {
        Self {
            attempt_id: attempt_id.to_string(),
            reason,
            explanation: reason.explanation(),
            finalized,
        }
    }
}

/// Drives one in-progress attempt.
///
/// Answers are applied locally first and saved in the background; the local
/// map is what gets submitted. Timers arrive through [`AttemptSession::next_timer`]
/// and must be passed back to [`AttemptSession::on_timer`] by the owner.
pub struct AttemptSession {
    attempt_id: String,
    api: Arc<dyn AttemptApi>,
    settings: SessionSettings,
    clock: Clock,
    scheduler: Scheduler,
    state: SessionState,
    quiz_title: String,
    questions: Vec<Question>,
    answers: HashMap<String, Vec<String>>,
    current_index: usize,
    countdown: Option<Countdown>,
    hidden_since: Option<DateTime<Utc>>,
    confirming: bool,
    saves: JoinSet<()>,
    /// The "away start" notice; "away end" must not overtake it.
    away_start: Option<JoinHandle<()>>,
}

impl AttemptSession {
    pub fn new(
        attempt_id: impl Into<String>,
        api: Arc<dyn AttemptApi>,
        settings: SessionSettings,
        clock: Clock,
    ) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            api,
            settings,
            clock,
            scheduler: Scheduler::new(),
            state: SessionState::Loading,
            quiz_title: String::new(),
            questions: Vec::new(),
            answers: HashMap::new(),
            current_index: 0,
            countdown: None,
            hidden_since: None,
            confirming: false,
            saves: JoinSet::new(),
            away_start: None,
        }
    }

    pub async fn open(
        attempt_id: impl Into<String>,
        api: Arc<dyn AttemptApi>,
        settings: SessionSettings,
        clock: Clock,
    ) -> Result<Self> {
        let mut session = Self::new(attempt_id, api, settings, clock);
        session.load().await?;
        Ok(session)
    }

    pub async fn load(&mut self) -> Result<()> {
        if self.state != SessionState::Loading {
            return Err(Error::InvalidState(format!("cannot load a session that is {}", self.state)));
        }

        let attempt = match self.api.fetch_attempt(&self.attempt_id).await {
            Ok(attempt) => attempt,
            Err(e) => {
                error!(attempt_id = %self.attempt_id, error = %e, "Failed to load quiz attempt");
                self.state = SessionState::Failed(e.to_string());
                return Err(e);
            }
        };

        if attempt.is_completed {
            let message = "This attempt has already been submitted".to_string();
            self.state = SessionState::Failed(message.clone());
            return Err(Error::InvalidState(message));
        }

        self.answers = attempt
            .quiz
            .questions
            .iter()
            .map(|q| (q.id.clone(), Vec::new()))
            .collect();
        for saved in attempt.answers {
            match self.answers.get_mut(&saved.question_id) {
                Some(selection) => *selection = saved.selected_options,
                None => warn!(question_id = %saved.question_id, "Ignoring saved answer for unknown question"),
            }
        }

        self.countdown = Some(Countdown::new(attempt.start_time, attempt.quiz.duration));
        self.quiz_title = attempt.quiz.title;
        self.questions = attempt.quiz.questions;
        self.current_index = 0;
        self.scheduler.schedule_repeating(TimerName::Countdown, self.settings.tick);
        self.state = SessionState::Active;

        info!(
            attempt_id = %self.attempt_id,
            questions = self.questions.len(),
            remaining = %self.time_left(),
            "Attempt session started"
        );
        Ok(())
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn quiz_title(&self) -> &str {
        &self.quiz_title
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn current_selection(&self) -> &[String] {
        self.current_question()
            .and_then(|q| self.selection(&q.id))
            .unwrap_or(&[])
    }

    pub fn selection(&self, question_id: &str) -> Option<&[String]> {
        self.answers.get(question_id).map(Vec::as_slice)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers
            .get(question_id)
            .map(|selected| !selected.is_empty())
            .unwrap_or(false)
    }

    /// In question order, for the navigation grid.
    pub fn answered_flags(&self) -> Vec<bool> {
        self.questions.iter().map(|q| self.is_answered(&q.id)).collect()
    }

    pub fn answered_count(&self) -> usize {
        self.answered_flags().into_iter().filter(|answered| *answered).count()
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_go_next(&self) -> bool {
        self.current_index + 1 < self.questions.len()
    }

    /// Out-of-range indices are ignored.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index >= self.questions.len() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn next(&mut self) -> bool {
        self.can_go_next() && self.go_to(self.current_index + 1)
    }

    pub fn previous(&mut self) -> bool {
        self.can_go_previous() && self.go_to(self.current_index - 1)
    }

    pub fn time_left(&self) -> TimeLeft {
        self.countdown
            .map(|c| c.time_left(self.clock.now()))
            .unwrap_or_default()
    }

    pub fn is_almost_done(&self) -> bool {
        self.countdown
            .map(|c| c.is_almost_done(self.clock.now(), self.settings.low_time_warning))
            .unwrap_or(false)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_since.is_some()
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(Error::InvalidState(format!("session is {}", self.state)));
        }
        Ok(())
    }

    /// Picks `option_id`. Replaces the selection unless multi-select is on
    /// for a multiple-choice question, in which case the option is toggled.
    pub fn select_option(&mut self, question_id: &str, option_id: &str) -> Result<()> {
        self.ensure_active()?;
        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.to_string()))?;

        let selected = if self.settings.multi_select && question.question_type == QuestionType::MultipleChoice {
            let mut current = self.answers.get(question_id).cloned().unwrap_or_default();
            match current.iter().position(|id| id == option_id) {
                Some(pos) => {
                    current.remove(pos);
                }
                None => current.push(option_id.to_string()),
            }
            current
        } else {
            vec![option_id.to_string()]
        };

        self.set_answer(question_id, selected)
    }

    pub fn clear_answer(&mut self, question_id: &str) -> Result<()> {
        self.set_answer(question_id, Vec::new())
    }

    /// Replaces the selection for one question and saves it in the background.
    /// More than one option is only accepted for multiple-choice questions
    /// with multi-select enabled.
    pub fn set_answer(&mut self, question_id: &str, selected: Vec<String>) -> Result<()> {
        self.ensure_active()?;
        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.to_string()))?;

        let mut deduped: Vec<String> = Vec::with_capacity(selected.len());
        for option_id in selected {
            if !question.has_option(&option_id) {
                return Err(Error::InvalidState(format!(
                    "option {} does not belong to question {}",
                    option_id, question_id
                )));
            }
            if !deduped.contains(&option_id) {
                deduped.push(option_id);
            }
        }

        let multi_allowed = self.settings.multi_select && question.question_type == QuestionType::MultipleChoice;
        if deduped.len() > 1 && !multi_allowed {
            return Err(Error::InvalidState(format!(
                "question {} accepts a single option",
                question_id
            )));
        }

        self.answers.insert(question_id.to_string(), deduped.clone());
        self.spawn_save(SaveAnswerRequest {
            question_id: question_id.to_string(),
            selected_options: deduped,
        });
        Ok(())
    }

    fn spawn_save(&mut self, request: SaveAnswerRequest) {
        let api = Arc::clone(&self.api);
        let attempt_id = self.attempt_id.clone();
        self.saves.spawn(async move {
            let question_id = request.question_id.clone();
            if let Err(e) = api.save_answer(&attempt_id, request).await {
                warn!(%attempt_id, %question_id, error = %e, "Failed to save answer");
            }
        });
    }

    pub fn request_manual_submit(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.confirming = true;
        Ok(())
    }

    pub fn cancel_submit(&mut self) {
        self.confirming = false;
    }

    pub async fn confirm_submit(&mut self) -> Result<SessionOutcome> {
        if !self.confirming {
            return Err(Error::InvalidState("submission has not been requested".to_string()));
        }
        self.confirming = false;
        self.submit(SubmissionReason::Manual).await
    }

    pub async fn set_visibility(&mut self, visibility: Visibility) -> Result<Option<SessionOutcome>> {
        match visibility {
            Visibility::Hidden => {
                self.went_hidden();
                Ok(None)
            }
            Visibility::Visible => self.came_back().await,
        }
    }

    fn went_hidden(&mut self) {
        if !self.is_active() || self.hidden_since.is_some() {
            return;
        }
        self.hidden_since = Some(self.clock.now());

        let api = Arc::clone(&self.api);
        let attempt_id = self.attempt_id.clone();
        self.away_start = Some(tokio::spawn(async move {
            if let Err(e) = api.register_away(&attempt_id, AwayAction::Start).await {
                warn!(%attempt_id, error = %e, "Failed to register start of away time");
            }
        }));

        self.scheduler
            .schedule_once(TimerName::AwayFallback, self.settings.away_limit);
        info!(attempt_id = %self.attempt_id, "Quiz hidden, away timer armed");
    }

    async fn came_back(&mut self) -> Result<Option<SessionOutcome>> {
        if !self.is_active() {
            return Ok(None);
        }
        let Some(hidden_since) = self.hidden_since.take() else {
            return Ok(None);
        };
        self.scheduler.cancel(TimerName::AwayFallback);

        let away_secs = (self.clock.now() - hidden_since).num_seconds();
        info!(attempt_id = %self.attempt_id, away_secs, "Quiz visible again");

        if let Some(start) = self.away_start.take() {
            match tokio::time::timeout(AWAY_START_TIMEOUT, start).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Away start task failed"),
                Err(_) => warn!(attempt_id = %self.attempt_id, "Away start still pending, sending away end anyway"),
            }
        }

        match self.api.register_away(&self.attempt_id, AwayAction::End).await {
            Ok(response) if response.auto_submitted => {
                info!(attempt_id = %self.attempt_id, "Attempt was already submitted by the server");
                self.terminate(SubmissionReason::AwayTooLong);
                Ok(Some(SessionOutcome::new(
                    &self.attempt_id,
                    SubmissionReason::AwayTooLong,
                    None,
                )))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(attempt_id = %self.attempt_id, error = %e, "Failed to register end of away time");
                Ok(None)
            }
        }
    }

    /// Pending until a live timer fires; see [`Scheduler::next_fired`].
    pub async fn next_timer(&mut self) -> TimerName {
        self.scheduler.next_fired().await
    }

    pub async fn on_timer(&mut self, timer: TimerName) -> Result<Option<SessionOutcome>> {
        if !self.is_active() {
            debug!(timer = timer.as_str(), state = %self.state, "Ignoring timer");
            return Ok(None);
        }

        match timer {
            TimerName::Countdown => {
                let expired = self
                    .countdown
                    .map(|c| c.is_expired(self.clock.now()))
                    .unwrap_or(false);
                if !expired {
                    return Ok(None);
                }
                info!(attempt_id = %self.attempt_id, "Time is up");
                self.submit(SubmissionReason::TimeExpired).await.map(Some)
            }
            TimerName::AwayFallback => {
                if self.hidden_since.is_none() {
                    debug!("Away timer fired after the quiz became visible");
                    return Ok(None);
                }
                info!(attempt_id = %self.attempt_id, "Away for too long");
                self.submit(SubmissionReason::AwayTooLong).await.map(Some)
            }
        }
    }

    fn answers_snapshot(&self) -> Vec<AttemptAnswer> {
        self.questions
            .iter()
            .map(|q| AttemptAnswer {
                question_id: q.id.clone(),
                selected_options: self.answers.get(&q.id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    async fn drain_saves(&mut self) {
        let saves = &mut self.saves;
        let drained = tokio::time::timeout(SAVE_DRAIN_TIMEOUT, async {
            while let Some(joined) = saves.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Answer save task failed");
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(pending = self.saves.len(), "Submitting before all answer saves finished");
        }
    }

    /// Finalizes once. On failure the session is active again and the caller
    /// may retry.
    async fn submit(&mut self, reason: SubmissionReason) -> Result<SessionOutcome> {
        self.ensure_active()?;
        self.state = SessionState::Submitting(reason);
        self.confirming = false;

        self.drain_saves().await;
        let request = SubmitAttemptRequest {
            submission_reason: reason,
            answers: self.answers_snapshot(),
        };

        match self.api.submit_attempt(&self.attempt_id, request).await {
            Ok(finalized) => {
                info!(attempt_id = %self.attempt_id, %reason, "Attempt submitted");
                self.terminate(reason);
                Ok(SessionOutcome::new(&self.attempt_id, reason, Some(finalized)))
            }
            Err(e) => {
                error!(attempt_id = %self.attempt_id, %reason, error = %e, "Failed to submit attempt");
                self.state = SessionState::Active;
                Err(e)
            }
        }
    }

    fn terminate(&mut self, reason: SubmissionReason) {
        self.scheduler.cancel_all();
        self.hidden_since = None;
        self.confirming = false;
        self.state = SessionState::Terminated(reason);
    }

    /// Stops all timers. Saves and away notices still in flight finish on
    /// their own.
    pub fn close(&mut self) {
        self.scheduler.cancel_all();
        self.saves.detach_all();
        self.away_start = None;
    }
}

impl Drop for AttemptSession {
    fn drop(&mut self) {
        self.close();
    }
}
