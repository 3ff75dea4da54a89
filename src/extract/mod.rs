//! Query decomposition: one LLM call turns a raw question into a [`ConstraintSet`].

mod parse;
pub mod types;

pub use types::ConstraintSet;

use tracing::debug;

use crate::llm::{ChatMessage, CompletionClient, LlmError, Sampling};

/// Queries shorter than this (in characters) are used verbatim.
const MIN_DECOMPOSE_CHARS: usize = 10;

const SYSTEM_PROMPT: &str = r#"Decompose the question into search constraints.

Return only a JSON object with these fields:
- "core_entity": the main subject to search for, with its most distinguishing qualifiers
- "time_constraint": the year, date or period the question is bound to, or null
- "key_features": 3-8 short search keywords: names, places, organizations, numbers, professions, awards, works
- "core_question": the question itself with all background removed

Keep the language of the input. Do not summarize away specific details such as "second half of the 1800s". No explanations.

Example:
Input: A Japanese musician who joined a famous Japanese band at age 26. The band's name contains a well-known Japanese city. Who is the musician?
Output: {"core_entity": "Japanese musician joined famous band at age 26", "time_constraint": null, "key_features": ["Japanese band", "city name", "26 years old", "musician"], "core_question": "Who is the musician"}

Example:
Input: What title was this Peking Opera performer awarded by the Ministry of Culture between 2015-2020?
Output: {"core_entity": "Peking Opera performer Ministry of Culture title", "time_constraint": "2015-2020", "key_features": ["Peking Opera", "Ministry of Culture", "award", "title"], "core_question": "What title was awarded"}"#;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("constraint extraction failed: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed constraint reply: {0}")]
    Malformed(String),
}

/// Turns raw query text into a [`ConstraintSet`].
pub trait Extract {
    async fn extract(&self, query: &str) -> Result<ConstraintSet, ExtractionError>;
}

pub struct ConstraintExtractor<C> {
    llm: C,
}

impl<C: CompletionClient> ConstraintExtractor<C> {
    pub fn new(llm: C) -> Self {
        Self { llm }
    }
}

impl<C: CompletionClient> Extract for ConstraintExtractor<C> {
    async fn extract(&self, query: &str) -> Result<ConstraintSet, ExtractionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ExtractionError::EmptyQuery);
        }
        if query.chars().count() < MIN_DECOMPOSE_CHARS {
            debug!("query too short to decompose, using it verbatim");
            return Ok(ConstraintSet::verbatim(query));
        }

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(query)];
        let reply = self.llm.complete(&messages, Sampling::STRUCTURED).await?;
        let constraints =
            parse::parse_constraints(&reply, query).map_err(ExtractionError::Malformed)?;

        debug!(
            core_entity = %constraints.core_entity,
            features = constraints.key_features.len(),
            "constraints extracted"
        );
        Ok(constraints)
    }
}
