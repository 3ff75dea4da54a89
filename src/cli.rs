use std::path::PathBuf;

use clap::Parser;
use clap::builder::TypedValueParser;

use crate::pipeline::{DEFAULT_CONCURRENCY, InputFields};
use crate::synth::{ContextMode, DEFAULT_MAX_CONTEXT_CHARS, SynthesisOptions};

/// Answers a batch of questions with LLM query decomposition, Google/Baidu
/// search and retrieval-augmented synthesis.
#[derive(Parser, Debug)]
#[command(name = "agentic-search", version)]
pub struct Cli {
    /// JSON array of question objects
    #[arg(short, long, default_value = "data/questions.json")]
    pub input: PathBuf,

    /// JSON Lines output, one {"id", "answer"} object per line
    #[arg(short, long, default_value = "result/answers.jsonl")]
    pub output: PathBuf,

    /// Records processed at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY, value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    pub concurrency: usize,

    /// Results requested from each search backend
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Character budget of the synthesis context
    #[arg(long, default_value_t = DEFAULT_MAX_CONTEXT_CHARS)]
    pub max_context_chars: usize,

    /// Build the context from the N most relevant sentences instead of whole results
    #[arg(long, value_name = "N")]
    pub focus_sentences: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Input field holding the record id
    #[arg(long, default_value = "id")]
    pub id_field: String,

    /// Input field holding the question text
    #[arg(long, default_value = "query")]
    pub query_field: String,

    /// Input field holding a reference answer, used for the match count
    #[arg(long)]
    pub expected_field: Option<String>,

    /// Write per-record traces as pretty JSON to this path
    #[arg(long)]
    pub process_log: Option<PathBuf>,
}

impl Cli {
    pub fn input_fields(&self) -> InputFields {
        InputFields {
            id: self.id_field.clone(),
            query: self.query_field.clone(),
            expected: self.expected_field.clone(),
        }
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            max_context_chars: self.max_context_chars,
            mode: match self.focus_sentences {
                Some(sentences) if sentences > 0 => ContextMode::Focused { sentences },
                _ => ContextMode::Full,
            },
        }
    }
}
