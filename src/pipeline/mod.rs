//! Drives every query record through extraction, search, cleaning and
//! synthesis with bounded concurrency, streaming answers to a JSONL file.

pub mod input;
pub mod output;
pub mod trace;

pub use input::{InputError, InputFields, QueryRecord, RecordId, load_records};
pub use output::{AnswerRecord, JsonlWriter, OutputError, write_json_pretty};
pub use trace::{RecordTrace, Stage};

use std::fmt;

use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};

use crate::clean::{CleanPolicy, clean_evidence};
use crate::extract::Extract;
use crate::search::{Search, build_query};
use crate::synth::Synthesize;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Answered,
    /// Emitted with an empty answer after synthesis failed.
    Unanswered,
    /// Not emitted; extraction or search failed.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub skipped: usize,
    /// Records whose answer matched their expected one; `None` when no record
    /// carried an expected answer.
    pub matched: Option<usize>,
}

impl RunSummary {
    fn record(&mut self, outcome: Outcome, trace: &RecordTrace) {
        self.total += 1;
        match outcome {
            Outcome::Answered => self.answered += 1,
            Outcome::Unanswered => self.unanswered += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        if trace.expected.is_some() {
            *self.matched.get_or_insert(0) += usize::from(trace.matched == Some(true));
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} answered, {} unanswered, {} skipped",
            self.total, self.answered, self.unanswered, self.skipped
        )?;
        if let Some(matched) = self.matched {
            write!(f, ", {matched} matched expected")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Per-record traces in completion order.
    pub traces: Vec<RecordTrace>,
}

pub struct Pipeline<E, S, Y> {
    extractor: E,
    search: S,
    synthesizer: Y,
    policy: CleanPolicy,
    concurrency: usize,
}

impl<E: Extract, S: Search, Y: Synthesize> Pipeline<E, S, Y> {
    pub fn new(extractor: E, search: S, synthesizer: Y, concurrency: usize) -> Self {
        Self {
            extractor,
            search,
            synthesizer,
            policy: CleanPolicy::default(),
            concurrency: concurrency.max(1),
        }
    }

    /// Processes `records` and writes one line per emitted answer to `writer`.
    ///
    /// Per-record failures are logged and counted; only output errors abort.
    pub async fn run(
        &self,
        records: &[QueryRecord],
        writer: &mut JsonlWriter,
    ) -> Result<RunReport, OutputError> {
        info!(records = records.len(), concurrency = self.concurrency, "run started");

        let mut completed = stream::iter(records)
            .map(|record| self.process(record))
            .buffer_unordered(self.concurrency);

        let mut summary = RunSummary::default();
        let mut traces = Vec::with_capacity(records.len());

        while let Some((outcome, trace)) = completed.next().await {
            if outcome != Outcome::Skipped {
                writer.write(&AnswerRecord {
                    id: trace.id.clone(),
                    answer: trace.answer.clone().unwrap_or_default(),
                })?;
            }
            summary.record(outcome, &trace);
            traces.push(trace);
        }

        info!(
            total = summary.total,
            answered = summary.answered,
            unanswered = summary.unanswered,
            skipped = summary.skipped,
            matched = ?summary.matched,
            "run finished"
        );
        Ok(RunReport { summary, traces })
    }

    /// Runs one record through every stage. Never fails; the outcome says
    /// whether and how the record is emitted.
    pub async fn process(&self, record: &QueryRecord) -> (Outcome, RecordTrace) {
        let id = &record.id;
        let mut trace = RecordTrace::new(record);

        let constraints = match self.extractor.extract(&record.query).await {
            Ok(constraints) => constraints,
            Err(error) => {
                warn!(%id, %error, "extraction failed, skipping record");
                trace.fail(Stage::Extraction, &error);
                return (Outcome::Skipped, trace);
            }
        };
        trace.core_question = Some(constraints.core_question.clone());
        trace.search_query = Some(build_query(&constraints));
        trace.constraints = Some(constraints.clone());

        let raw = match self.search.search(&constraints).await {
            Ok(items) => items,
            Err(error) => {
                warn!(%id, %error, "search unavailable, skipping record");
                trace.fail(Stage::Search, &error);
                return (Outcome::Skipped, trace);
            }
        };
        trace.raw_results = raw.len();

        let evidence = clean_evidence(raw, &self.policy);
        trace.cleaned_results = evidence.len();

        match self
            .synthesizer
            .synthesize(&record.query, &constraints, &evidence)
            .await
        {
            Ok(synthesis) => {
                info!(%id, answer = %synthesis.answer, evidence = evidence.len(), "answered");
                trace.context = Some(synthesis.context);
                trace.raw_answer = Some(synthesis.raw_answer);
                trace.retried = synthesis.retried;
                trace.finish(&synthesis.answer);
                (Outcome::Answered, trace)
            }
            Err(error) => {
                warn!(%id, %error, "synthesis failed, emitting empty answer");
                trace.fail(Stage::Synthesis, &error);
                trace.finish("");
                (Outcome::Unanswered, trace)
            }
        }
    }
}
