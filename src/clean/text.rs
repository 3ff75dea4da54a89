use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

/// Boilerplate anchored at the start of a snippet.
static LEADING_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\.{3}|…)\s*").expect("valid regex"));

/// Boilerplate anchored at the end of a snippet: link prompts, trailing
/// ellipses, and Google's "Missing: … | Show results with: …" tail. The tail
/// needs its `|` separator so prose containing "missing:" is left alone.
static TRAILING_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\s*(?:\.{3}|…|\b(?:read more|click here|learn more|see more|more info|查看更多|阅读全文|展开全文)\b|\bmissing:[^|]*\|\s*(?:show results with|must include):[^|]*)\s*)+$",
    )
    .expect("valid regex")
});

/// Visible text of an HTML fragment with control characters removed and
/// whitespace collapsed.
pub fn strip_markup(text: &str) -> String {
    let decoded = if text.contains('<') || text.contains('&') {
        Html::parse_fragment(text)
            .root_element()
            .text()
            .collect::<String>()
    } else {
        text.to_string()
    };

    decoded
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn strip_boilerplate(text: &str) -> String {
    let text = LEADING_NOISE.replace(text, "");
    let text = TRAILING_NOISE.replace(&text, "");
    text.trim().to_string()
}

/// Lowercased alphanumeric characters only; two snippets that differ solely in
/// case, spacing or punctuation share a canonical form.
pub fn canonical(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Jaccard similarity of the character trigram sets of two canonical strings.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f64 / union as f64
}

fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}
