use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

/// Largest number of options a single-select question may carry.
pub const MAX_OPTIONS: usize = 5;

/// Opaque, stable question identifier owned by the data store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference into the image store plus an optional per-image scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImageRef {
    /// Path relative to the trusted image root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuestionRecord {
    pub id: QuestionId,
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_image: Option<ImageRef>,
    pub answer: AnswerFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Author notes. Never rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// How a question is answered. Free-response questions cannot carry options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum AnswerFormat {
    SingleSelect {
        options: Vec<OptionRecord>,
    },
    FreeResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_answer: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionRecord {
    /// Single letter, unique within the question. Defines display order.
    pub label: char,
    pub content: OptionContent,
    #[serde(default)]
    pub correct: bool,
}

/// Option body: text, an image, or both. Never neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum OptionContent {
    Text { markup: String },
    Image { image: ImageRef },
    TextAndImage { markup: String, image: ImageRef },
}

impl OptionContent {
    pub fn markup(&self) -> Option<&str> {
        match self {
            OptionContent::Text { markup } | OptionContent::TextAndImage { markup, .. } => {
                Some(markup)
            }
            OptionContent::Image { .. } => None,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            OptionContent::Image { image } | OptionContent::TextAndImage { image, .. } => {
                Some(image)
            }
            OptionContent::Text { .. } => None,
        }
    }
}

impl QuestionRecord {
    /// Options sorted by label, or an empty slice for free-response questions.
    pub fn options_in_label_order(&self) -> Vec<&OptionRecord> {
        match &self.answer {
            AnswerFormat::SingleSelect { options } => {
                let mut sorted: Vec<&OptionRecord> = options.iter().collect();
                sorted.sort_by_key(|o| o.label.to_ascii_uppercase());
                sorted
            }
            AnswerFormat::FreeResponse { .. } => Vec::new(),
        }
    }

    /// Label of the option marked correct. `None` for free-response
    /// questions and for single-select records that break the invariant.
    pub fn correct_label(&self) -> Option<char> {
        match &self.answer {
            AnswerFormat::SingleSelect { options } => {
                let mut correct = options.iter().filter(|o| o.correct);
                match (correct.next(), correct.next()) {
                    (Some(option), None) => Some(option.label.to_ascii_uppercase()),
                    _ => None,
                }
            }
            AnswerFormat::FreeResponse { .. } => None,
        }
    }

    /// Check the structural invariants of a single-select record.
    pub fn validate(&self) -> Result<(), CoreError> {
        let AnswerFormat::SingleSelect { options } = &self.answer else {
            return Ok(());
        };

        let invalid = |reason: String| CoreError::InvalidQuestion {
            id: self.id.to_string(),
            reason,
        };

        if options.is_empty() || options.len() > MAX_OPTIONS {
            return Err(invalid(format!(
                "expected 1 to {MAX_OPTIONS} options, found {}",
                options.len()
            )));
        }

        let mut seen = HashSet::new();
        for option in options {
            if !option.label.is_ascii_alphabetic() {
                return Err(invalid(format!("option label {:?} is not a letter", option.label)));
            }
            if !seen.insert(option.label.to_ascii_uppercase()) {
                return Err(invalid(format!("duplicate option label {:?}", option.label)));
            }
        }

        let correct = options.iter().filter(|o| o.correct).count();
        if correct != 1 {
            return Err(invalid(format!("expected exactly one correct option, found {correct}")));
        }

        Ok(())
    }
}
