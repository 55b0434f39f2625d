use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::models::question::{default_points, QuestionType};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizPayload {
    #[validate(custom(function = "non_blank", message = "Title is required"))]
    pub title: String,
    #[validate(custom(function = "non_blank", message = "Description is required"))]
    pub description: String,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration: u32,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuizPayload {
    // Trim and convert empty strings to None
    #[serde(default, deserialize_with = "trim_optional_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "trim_optional_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_question_options"))]
pub struct CreateQuestionPayload {
    #[validate(custom(function = "non_blank", message = "Question text is required"))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[validate(length(min = 2, message = "A question needs at least two options"))]
    pub options: Vec<OptionPayload>,
    #[validate(range(min = 1, message = "Points must be at least 1"))]
    #[serde(default = "default_points")]
    pub points: u32,
}

impl CreateQuestionPayload {
    /// The fixed True/False pair, with `answer` marking which one is correct.
    pub fn true_false(question_text: impl Into<String>, answer: bool, points: u32) -> Self {
        Self {
            question_text: question_text.into(),
            question_type: QuestionType::TrueFalse,
            options: vec![
                OptionPayload { text: "True".into(), is_correct: answer },
                OptionPayload { text: "False".into(), is_correct: !answer },
            ],
            points,
        }
    }
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn validate_question_options(question: &CreateQuestionPayload) -> Result<(), ValidationError> {
    let correct = question.options.iter().filter(|o| o.is_correct).count();
    match question.question_type {
        QuestionType::MultipleChoice => {
            if correct == 0 {
                return Err(validation_error(
                    "no_correct_option",
                    "At least one option must be marked as correct",
                ));
            }
            if question.options.iter().any(|o| o.text.trim().is_empty()) {
                return Err(validation_error("empty_option", "All options must have text"));
            }
        }
        QuestionType::TrueFalse => {
            if question.options.len() != 2 {
                return Err(validation_error(
                    "true_false_options",
                    "True/False questions have exactly two options",
                ));
            }
            if correct != 1 {
                return Err(validation_error(
                    "true_false_correct",
                    "Exactly one option must be marked as correct for True/False questions",
                ));
            }
        }
    }
    Ok(())
}

/// One row of the bulk upload template:
/// `questionText, questionType, option1, option1Correct, ..., option4, option4Correct, points`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkQuestionRow {
    pub question_text: String,
    pub question_type: String,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub option1_correct: bool,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub option2_correct: bool,
    #[serde(default)]
    pub option3: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub option3_correct: bool,
    #[serde(default)]
    pub option4: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub option4_correct: bool,
    #[serde(default, deserialize_with = "deserialize_points")]
    pub points: Option<u32>,
}

impl BulkQuestionRow {
    /// Blank option cells are dropped; the result still has to pass validation.
    pub fn into_payload(self) -> Result<CreateQuestionPayload, String> {
        let question_type: QuestionType = self.question_type.parse()?;
        let options = [
            (self.option1, self.option1_correct),
            (self.option2, self.option2_correct),
            (self.option3, self.option3_correct),
            (self.option4, self.option4_correct),
        ]
        .into_iter()
        .filter_map(|(text, is_correct)| {
            let text = text?.trim().to_string();
            (!text.is_empty()).then_some(OptionPayload { text, is_correct })
        })
        .collect();

        Ok(CreateQuestionPayload {
            question_text: self.question_text.trim().to_string(),
            question_type,
            options,
            points: self.points.unwrap_or_else(default_points),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUploadRequest {
    pub questions: Vec<CreateQuestionPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadResponse {
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub error_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
        String(String),
    }

    match Option::<BoolOrInt>::deserialize(deserializer)? {
        None => Ok(false),
        Some(BoolOrInt::Bool(b)) => Ok(b),
        Some(BoolOrInt::Int(i)) => Ok(i != 0),
        Some(BoolOrInt::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("Invalid boolean string: {}", other))),
        },
    }
}

fn deserialize_points<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("Invalid points value: {}", s))),
    }
}
