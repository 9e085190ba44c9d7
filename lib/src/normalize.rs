use log::error;
use serde_json::Value;

use crate::data::{Question, Quiz};
use crate::error::NormalizeError;
use crate::raw_data::{RawQuestionData, RawQuizPayload};

pub const MISSING_QUESTION_TEXT: &str = "No question text";

/// Turns a generation payload into the canonical question list.
///
/// Accepted shapes, first match wins: a bare list of questions, an object
/// whose `quiz` field is a list, or a single object with a `question` field.
/// A question without an `options` list is a true/false item.
pub fn normalize(raw: &str) -> Result<Vec<Question>, NormalizeError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        error!("Error parsing quiz JSON: {e}");
        NormalizeError::MalformedPayload(e)
    })?;

    let payload = RawQuizPayload::from_value(value).ok_or_else(|| {
        error!("Unexpected quiz format: {raw}");
        NormalizeError::UnrecognizedShape
    })?;

    Ok(payload
        .into_items()
        .iter()
        .map(RawQuestionData::from_value)
        .map(Into::into)
        .collect())
}

pub fn normalize_quiz(raw: &str) -> Result<Quiz, NormalizeError> {
    normalize(raw).map(Quiz::new)
}

impl From<RawQuestionData> for Question {
    fn from(raw: RawQuestionData) -> Self {
        let text = raw
            .question
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| MISSING_QUESTION_TEXT.to_owned());

        match raw.options {
            Some(options) => Question::new(text, options),
            None => Question::true_false(text),
        }
    }
}
