use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::search::SearchItem;

/// A cut entry is only kept when at least this many characters of budget remain.
const MIN_PARTIAL_CHARS: usize = 80;
/// Sentences considered in focused mode.
const MAX_CANDIDATE_SENTENCES: usize = 50;
const MIN_SENTENCE_CHARS: usize = 10;
const FALLBACK_SENTENCES: usize = 2;

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？!?\n]+|\.\s+").expect("valid regex"));
static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z]{2,}\b").expect("valid regex"));

/// How evidence is turned into prompt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// Every cleaned result as a numbered entry, in evidence order.
    #[default]
    Full,
    /// Only the sentences sharing the most keywords with the question.
    Focused { sentences: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub text: String,
    /// Pieces (entries or sentences) that made it in, the cut one included.
    pub pieces_used: usize,
    pub pieces_dropped: usize,
}

/// Builds the context for `question` from `evidence`, at most `max_chars` characters.
///
/// Pieces are added in priority order; the first piece that does not fit is cut
/// to the remaining budget (or dropped when too little remains) and everything
/// after it is dropped.
pub fn build_context(
    evidence: &[SearchItem],
    question: &str,
    mode: ContextMode,
    max_chars: usize,
) -> Context {
    match mode {
        ContextMode::Full => {
            let entries: Vec<String> = evidence
                .iter()
                .enumerate()
                .map(|(i, item)| render_entry(i + 1, item))
                .collect();
            fit_to_budget(entries, "\n\n", max_chars)
        }
        ContextMode::Focused { sentences } => {
            let picked = relevant_sentences(evidence, question, sentences.max(1));
            fit_to_budget(picked, "\n", max_chars)
        }
    }
}

fn render_entry(n: usize, item: &SearchItem) -> String {
    let mut entry = format!("[{n}] {}", item.title);
    if let Some(date) = &item.published {
        entry.push_str(&format!(" ({date})"));
    }
    entry.push('\n');
    entry.push_str(&item.snippet);
    entry
}

fn fit_to_budget(pieces: Vec<String>, separator: &str, max_chars: usize) -> Context {
    let total = pieces.len();
    let sep_chars = separator.chars().count();
    let mut text = String::new();
    let mut used_chars = 0;
    let mut used = 0;

    for piece in pieces {
        let sep = if text.is_empty() { 0 } else { sep_chars };
        let len = piece.chars().count();
        if used_chars + sep + len <= max_chars {
            if sep > 0 {
                text.push_str(separator);
            }
            text.push_str(&piece);
            used_chars += sep + len;
            used += 1;
            continue;
        }

        let remaining = max_chars.saturating_sub(used_chars + sep);
        if remaining >= MIN_PARTIAL_CHARS {
            if sep > 0 {
                text.push_str(separator);
            }
            text.extend(piece.chars().take(remaining - 1));
            text.push('…');
            used += 1;
        }
        break;
    }

    Context {
        text,
        pieces_used: used,
        pieces_dropped: total - used,
    }
}

/// The `limit` evidence sentences sharing the most ASCII keywords with
/// `question`, best first; the first two sentences when none overlap.
pub fn relevant_sentences(evidence: &[SearchItem], question: &str, limit: usize) -> Vec<String> {
    let sentences: Vec<String> = evidence
        .iter()
        .flat_map(|item| [item.title.as_str(), item.snippet.as_str()])
        .flat_map(|doc| SENTENCE_BREAK.split(doc))
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(MAX_CANDIDATE_SENTENCES)
        .map(str::to_string)
        .collect();

    let wanted = keywords(question);
    let mut scored: Vec<(usize, &String)> = sentences
        .iter()
        .map(|s| (keywords(s).intersection(&wanted).count(), s))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let top: Vec<String> = scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .take(limit)
        .map(|(_, s)| s.clone())
        .collect();

    if top.is_empty() {
        sentences.into_iter().take(FALLBACK_SENTENCES).collect()
    } else {
        top
    }
}

fn keywords(text: &str) -> HashSet<String> {
    KEYWORD
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}
