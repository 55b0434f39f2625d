use std::collections::HashSet;

use crate::models::question::{Question, QuestionType};
use crate::models::results::GradedAttempt;

/// How one option of a graded question should be marked in the results view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    SelectedCorrect,
    SelectedIncorrect,
    MissedCorrect,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceBand {
    Strong,
    Fair,
    Weak,
}

impl PerformanceBand {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            p if p >= 70 => PerformanceBand::Strong,
            p if p >= 50 => PerformanceBand::Fair,
            _ => PerformanceBand::Weak,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceBand::Strong => "strong",
            PerformanceBand::Fair => "fair",
            PerformanceBand::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionVerdict {
    pub question_id: String,
    pub question_text: String,
    pub is_correct: bool,
    pub points: u32,
    pub marks: Vec<(String, OptionMark)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub quiz_title: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: u32,
    pub minutes_taken: i64,
    pub band: PerformanceBand,
    pub verdicts: Vec<QuestionVerdict>,
}

impl ResultSummary {
    pub fn correct_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_correct).count()
    }
}

/// Display-only correctness; the server's score stays authoritative.
pub struct GradingService;

impl GradingService {
    pub fn is_answer_correct(question: &Question, selected: &[String]) -> bool {
        match question.question_type {
            QuestionType::TrueFalse => match selected {
                [only] => question
                    .options
                    .iter()
                    .any(|o| &o.id == only && o.is_correct.unwrap_or(false)),
                _ => false,
            },
            QuestionType::MultipleChoice => {
                let chosen: HashSet<&str> = selected.iter().map(String::as_str).collect();
                let correct: HashSet<&str> = question.correct_option_ids().collect();
                chosen == correct
            }
        }
    }

    pub fn option_marks(question: &Question, selected: &[String]) -> Vec<(String, OptionMark)> {
        question
            .options
            .iter()
            .map(|option| {
                let picked = selected.contains(&option.id);
                let correct = option.is_correct.unwrap_or(false);
                let mark = match (picked, correct) {
                    (true, true) => OptionMark::SelectedCorrect,
                    (true, false) => OptionMark::SelectedIncorrect,
                    (false, true) => OptionMark::MissedCorrect,
                    (false, false) => OptionMark::Neutral,
                };
                (option.id.clone(), mark)
            })
            .collect()
    }

    pub fn summarize(attempt: &GradedAttempt) -> ResultSummary {
        let verdicts = attempt
            .answers
            .iter()
            .map(|answer| QuestionVerdict {
                question_id: answer.question.id.clone(),
                question_text: answer.question.question_text.clone(),
                is_correct: Self::is_answer_correct(&answer.question, &answer.selected_options),
                points: answer.question.points,
                marks: Self::option_marks(&answer.question, &answer.selected_options),
            })
            .collect();

        let percentage = if attempt.max_score > 0.0 {
            ((attempt.score / attempt.max_score) * 100.0).round().max(0.0) as u32
        } else {
            0
        };
        let minutes_taken = (attempt.end_time - attempt.start_time).num_minutes().max(0);

        ResultSummary {
            quiz_title: attempt.quiz.title.clone(),
            score: attempt.score,
            max_score: attempt.max_score,
            percentage,
            minutes_taken,
            band: PerformanceBand::from_percentage(percentage),
            verdicts,
        }
    }
}
