//! Per-record process log: what each stage produced for one record.

use serde::Serialize;

use super::input::{QueryRecord, RecordId};
use crate::extract::ConstraintSet;

/// Pipeline stage a record stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Search,
    Synthesis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTrace {
    pub id: RecordId,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub core_question: Option<String>,
    pub constraints: Option<ConstraintSet>,
    pub search_query: Option<String>,
    pub raw_results: usize,
    pub cleaned_results: usize,
    pub context: Option<String>,
    pub raw_answer: Option<String>,
    /// Whether the answer came from the plain-prompt retry.
    pub retried: bool,
    pub answer: Option<String>,
    pub error: Option<StageError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
}

impl RecordTrace {
    pub fn new(record: &QueryRecord) -> Self {
        Self {
            id: record.id.clone(),
            query: record.query.clone(),
            expected: record.expected.clone(),
            core_question: None,
            constraints: None,
            search_query: None,
            raw_results: 0,
            cleaned_results: 0,
            context: None,
            raw_answer: None,
            retried: false,
            answer: None,
            error: None,
            matched: None,
        }
    }

    pub fn fail(&mut self, stage: Stage, error: &dyn std::error::Error) {
        self.error = Some(StageError {
            stage,
            message: error.to_string(),
        });
    }

    /// Stores the emitted answer and, when a reference exists, whether it matches.
    pub fn finish(&mut self, answer: &str) {
        self.answer = Some(answer.to_string());
        self.matched = self
            .expected
            .as_deref()
            .map(|expected| answers_match(answer, expected));
    }
}

/// Loose comparison: equal, or one contains the other, ignoring case,
/// whitespace and punctuation. An empty answer never matches.
pub fn answers_match(answer: &str, expected: &str) -> bool {
    let norm = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    };
    let (a, e) = (norm(answer), norm(expected));
    if a.is_empty() || e.is_empty() {
        return false;
    }
    a == e || a.contains(&e) || e.contains(&a)
}
