//! Retrieval-augmented answer generation over cleaned evidence.

pub mod answer;
pub mod context;

pub use answer::{needs_retry, tidy_answer};
pub use context::{ContextMode, build_context};

use tracing::{debug, warn};

use crate::extract::ConstraintSet;
use crate::llm::{ChatMessage, CompletionClient, LlmError, Sampling};
use crate::search::SearchItem;

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

const NO_EVIDENCE: &str = "(no search results)";

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("answer generation failed: {0}")]
    Llm(LlmError),

    #[error("model returned no usable answer")]
    Empty,
}

impl From<LlmError> for SynthesisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Empty => SynthesisError::Empty,
            other => SynthesisError::Llm(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Tidied answer span; never empty.
    pub answer: String,
    /// Model output the answer was taken from.
    pub raw_answer: String,
    /// Context the model saw.
    pub context: String,
    /// Whether the plain fallback prompt produced the answer.
    pub retried: bool,
}

/// Answers a query from evidence.
pub trait Synthesize {
    async fn synthesize(
        &self,
        query: &str,
        constraints: &ConstraintSet,
        evidence: &[SearchItem],
    ) -> Result<Synthesis, SynthesisError>;
}

#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    pub max_context_chars: usize,
    pub mode: ContextMode,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            mode: ContextMode::Full,
        }
    }
}

pub struct AnswerSynthesizer<C> {
    llm: C,
    options: SynthesisOptions,
}

impl<C: CompletionClient> AnswerSynthesizer<C> {
    pub fn new(llm: C, options: SynthesisOptions) -> Self {
        Self { llm, options }
    }
}

impl<C: CompletionClient> Synthesize for AnswerSynthesizer<C> {
    async fn synthesize(
        &self,
        query: &str,
        constraints: &ConstraintSet,
        evidence: &[SearchItem],
    ) -> Result<Synthesis, SynthesisError> {
        let ctx = build_context(
            evidence,
            query,
            self.options.mode,
            self.options.max_context_chars,
        );
        debug!(
            used = ctx.pieces_used,
            dropped = ctx.pieces_dropped,
            chars = ctx.text.chars().count(),
            "context built"
        );
        let context = if ctx.text.is_empty() {
            NO_EVIDENCE.to_string()
        } else {
            ctx.text
        };

        let question = constraints.core_question.as_str();
        let messages = [
            ChatMessage::system(answer_prompt(query, &context)),
            ChatMessage::user(question),
        ];
        let mut raw_answer = self.llm.complete(&messages, Sampling::ANSWER).await?;
        let mut answer = tidy_answer(&raw_answer);
        let mut retried = false;

        if needs_retry(&answer) {
            debug!(%answer, "answer looks like commentary, retrying with plain prompt");
            let plain = [ChatMessage::user(format!(
                "{context}\n\nQuestion: {question}\nAnswer:"
            ))];
            match self.llm.complete(&plain, Sampling::ANSWER).await {
                Ok(reply) => {
                    let tidied = tidy_answer(&reply);
                    if !tidied.is_empty() {
                        answer = tidied;
                        raw_answer = reply;
                        retried = true;
                    }
                }
                Err(error) => warn!(%error, "retry failed, keeping first answer"),
            }
        }

        if answer.is_empty() {
            return Err(SynthesisError::Empty);
        }

        Ok(Synthesis {
            answer,
            raw_answer,
            context,
            retried,
        })
    }
}

fn answer_prompt(query: &str, context: &str) -> String {
    format!(
        r#"Answer the question as briefly as possible using the context.

Full question:
{query}

Context:
{context}

Rules:
1. Output only the answer: a name, place, number, date or title
2. At most 10 words
3. No explanations, no "according to"
4. Answer in the language of the question

Example:
Question: Who is the musician
Answer: Ringo Sheena

Example:
Question: What title was awarded
Answer: Outstanding Young Talent"#
    )
}
