use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{QuestionKind, QuestionNode};

/// Snapshot of every recorded answer keyed by question or form-field id.
pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// Typed answer payload. Serialized untagged so the wire shape stays
/// `string | number | string[] | boolean`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Number(f64),
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Choices(values.into_iter().map(Into::into).collect())
    }

    /// Required-field semantics: blank text and empty selections do not count.
    pub fn is_filled(&self) -> bool {
        match self {
            AnswerValue::Text(value) => !value.trim().is_empty(),
            AnswerValue::Choices(values) => values.iter().any(|value| !value.trim().is_empty()),
            AnswerValue::Number(value) => value.is_finite(),
            AnswerValue::Flag(_) => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Choices(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            AnswerValue::Flag(_) => "boolean",
            AnswerValue::Number(_) => "number",
            AnswerValue::Text(_) => "text",
            AnswerValue::Choices(_) => "list",
        }
    }
}

/// Rejections raised at the store boundary when a value does not fit its question.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnswerError {
    #[error("question '{question}' is informational and cannot be answered")]
    NotAnswerable { question: String },
    #[error("question '{question}' expects {expected}, received {found}")]
    ShapeMismatch {
        question: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("'{value}' is not an option of question '{question}'")]
    UnknownOption { question: String, value: String },
    #[error("{value} is outside the {min}..={max} range of question '{question}'")]
    OutOfRange {
        question: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{value}' is not a valid {expected} for question '{question}'")]
    Malformed {
        question: String,
        expected: &'static str,
        value: String,
    },
}

impl QuestionKind {
    /// Check that `value` fits this kind; the only place answer shapes are enforced.
    pub fn accepts(
        &self,
        question: &str,
        options: &[&str],
        value: &AnswerValue,
    ) -> Result<(), AnswerError> {
        let mismatch = |expected: &'static str| AnswerError::ShapeMismatch {
            question: question.to_string(),
            expected,
            found: value.shape(),
        };

        match (self, value) {
            (QuestionKind::Info, _) => Err(AnswerError::NotAnswerable {
                question: question.to_string(),
            }),
            (QuestionKind::SingleSelect, AnswerValue::Text(choice)) => {
                ensure_option(question, options, choice)
            }
            (QuestionKind::SingleSelect, _) => Err(mismatch("text")),
            (QuestionKind::MultiSelect, AnswerValue::Choices(choices)) => choices
                .iter()
                .try_for_each(|choice| ensure_option(question, options, choice)),
            (QuestionKind::MultiSelect, _) => Err(mismatch("list")),
            (QuestionKind::Scale { min, max }, AnswerValue::Number(number)) => {
                if number.is_finite() && *number >= *min && *number <= *max {
                    Ok(())
                } else {
                    Err(AnswerError::OutOfRange {
                        question: question.to_string(),
                        value: *number,
                        min: *min,
                        max: *max,
                    })
                }
            }
            (QuestionKind::Scale { .. }, _) => Err(mismatch("number")),
            (QuestionKind::Number, AnswerValue::Number(number)) if number.is_finite() => Ok(()),
            (QuestionKind::Number, AnswerValue::Number(number)) => Err(AnswerError::Malformed {
                question: question.to_string(),
                expected: "number",
                value: number.to_string(),
            }),
            (QuestionKind::Number, _) => Err(mismatch("number")),
            (QuestionKind::Text, AnswerValue::Text(_)) => Ok(()),
            (QuestionKind::Text, _) => Err(mismatch("text")),
            (QuestionKind::Email, AnswerValue::Text(email)) => {
                if looks_like_email(email) {
                    Ok(())
                } else {
                    Err(AnswerError::Malformed {
                        question: question.to_string(),
                        expected: "email address",
                        value: email.clone(),
                    })
                }
            }
            (QuestionKind::Email, _) => Err(mismatch("text")),
            (QuestionKind::Tel, AnswerValue::Text(phone)) => {
                if looks_like_phone(phone) {
                    Ok(())
                } else {
                    Err(AnswerError::Malformed {
                        question: question.to_string(),
                        expected: "phone number",
                        value: phone.clone(),
                    })
                }
            }
            (QuestionKind::Tel, _) => Err(mismatch("text")),
        }
    }
}

fn ensure_option(question: &str, options: &[&str], choice: &str) -> Result<(), AnswerError> {
    if options.contains(&choice) {
        Ok(())
    } else {
        Err(AnswerError::UnknownOption {
            question: question.to_string(),
            value: choice.to_string(),
        })
    }
}

fn looks_like_email(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.chars().any(char::is_whitespace) {
        return false;
    }
    match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

fn looks_like_phone(value: &str) -> bool {
    let mut digits = 0;
    for ch in value.trim().chars() {
        match ch {
            '0'..='9' => digits += 1,
            '+' | '-' | '(' | ')' | ' ' => {}
            _ => return false,
        }
    }
    digits >= 6
}

/// Mutable answer map. Values are only ever inserted or overwritten; nothing is pruned
/// when a branch retracts, the flow evaluator decides which answers are live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    answers: AnswerMap,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(answers: AnswerMap) -> Self {
        Self { answers }
    }

    /// Record an answer to a questionnaire node after checking it against the node's kind.
    pub fn answer(&mut self, node: &QuestionNode, value: AnswerValue) -> Result<(), AnswerError> {
        node.kind.accepts(node.id, &node.options, &value)?;
        self.answers.insert(node.id.to_string(), value);
        Ok(())
    }

    /// Record a form field that has no questionnaire node behind it.
    pub fn put(&mut self, field: impl Into<String>, value: AnswerValue) {
        self.answers.insert(field.into(), value);
    }

    pub fn merge(&mut self, partial: AnswerMap) {
        self.answers.extend(partial);
    }

    pub fn get(&self, id: &str) -> Option<&AnswerValue> {
        self.answers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.answers.contains_key(id)
    }

    pub fn is_filled(&self, id: &str) -> bool {
        self.answers
            .get(id)
            .map(AnswerValue::is_filled)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn as_map(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn snapshot(&self) -> AnswerMap {
        self.answers.clone()
    }
}
