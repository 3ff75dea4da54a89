//! Post-processing of raw model output into a short answer span.

const MAX_ANSWER_CHARS: usize = 30;
const FALLBACK_CHARS: usize = 20;
/// A `label:` prefix is only stripped when the colon sits this early.
const LABEL_COLON_MAX_INDEX: usize = 15;
const MIN_CLAUSE_CHARS: usize = 2;

/// Longest first, so "According to the reference" wins over "According to".
const LEAD_INS: &[&str] = &[
    "according to the provided information",
    "according to the search results",
    "according to the reference",
    "according to",
    "based on the provided information",
    "based on the information",
    "based on the reference",
    "based on",
    "from the information",
    "from the reference",
    "the search results show",
    "the information shows",
    "the reference shows",
    "the answer is",
    "answer is",
    "here is",
    "here are",
    "should be",
    "could be",
    "might be",
    "it is",
];

const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」', '《', '》'];
const CLAUSE_BREAKS: &[char] = &[',', '.', '\n', ';', '，', '。', '；'];
const TRAILING_PUNCT: &[char] = &['.', ',', ';', '!', '?', '。', '，', '；', '！', '？'];

/// Words that mark an answer as parroting the prompt instead of answering.
const META_WORDS: &[&str] = &["according", "based on", "information", "reference"];

/// Shortens `raw` to the answer span: lead-in phrases, labels, quotes and
/// trailing punctuation removed, first clause only, at most 30 characters.
///
/// Falls back to the first 20 characters of `raw` when nothing survives.
pub fn tidy_answer(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let mut answer = strip_lead_in(raw).to_string();

    if let Some((idx, _)) = answer.char_indices().find(|(_, c)| *c == ':' || *c == '：')
        && answer[..idx].chars().count() < LABEL_COLON_MAX_INDEX
    {
        let colon_len = answer[idx..].chars().next().map_or(1, char::len_utf8);
        answer = answer[idx + colon_len..].trim().to_string();
    }

    answer = answer.trim_matches(QUOTES).trim().to_string();

    for delim in CLAUSE_BREAKS {
        if let Some((first, _)) = answer.split_once(*delim) {
            let first = first.trim();
            if first.chars().count() > MIN_CLAUSE_CHARS {
                answer = first.to_string();
                break;
            }
        }
    }

    let answer: String = answer
        .trim_end_matches(TRAILING_PUNCT)
        .trim()
        .chars()
        .take(MAX_ANSWER_CHARS)
        .collect();
    let answer = answer.trim();

    if answer.is_empty() {
        raw.chars().take(FALLBACK_CHARS).collect::<String>().trim().to_string()
    } else {
        answer.to_string()
    }
}

/// Strips the first matching lead-in, only when it ends at a word boundary.
fn strip_lead_in(text: &str) -> &str {
    let lower = text.to_lowercase();
    // Lowercasing may change byte lengths outside ASCII; only trust ASCII prefixes.
    if lower.len() != text.len() {
        return text;
    }
    for lead in LEAD_INS {
        if lower.starts_with(lead) {
            let Some(rest) = text.get(lead.len()..) else {
                return text;
            };
            if rest.chars().next().is_none_or(|c| !c.is_alphanumeric()) {
                return rest.trim_start_matches(|c: char| c == ',' || c == ':' || c.is_whitespace());
            }
        }
    }
    text
}

/// Whether a tidied answer is too short or reads like commentary on the
/// context rather than an answer.
pub fn needs_retry(answer: &str) -> bool {
    if answer.chars().count() < 2 {
        return true;
    }
    let lower = answer.to_lowercase();
    META_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_answer_unchanged() {
        assert_eq!(tidy_answer("Beijing"), "Beijing");
        assert_eq!(tidy_answer("  北京  "), "北京");
    }

    #[test]
    fn lead_in_stripped() {
        assert_eq!(tidy_answer("According to the reference, Beijing."), "Beijing");
        assert_eq!(tidy_answer("The answer is Beijing"), "Beijing");
        assert_eq!(tidy_answer("It is 1969."), "1969");
    }

    #[test]
    fn lead_in_requires_word_boundary() {
        assert_eq!(tidy_answer("Itsuki Hiroshi"), "Itsuki Hiroshi");
        assert_eq!(tidy_answer("It isn't known"), "It isn't known");
    }

    #[test]
    fn early_label_stripped() {
        assert_eq!(tidy_answer("Answer: Ringo Sheena"), "Ringo Sheena");
        assert_eq!(tidy_answer("答案：北京"), "北京");
    }

    #[test]
    fn late_colon_kept() {
        assert_eq!(tidy_answer("The ceremony started at 20:08"), "The ceremony started at 20:08");
    }

    #[test]
    fn quotes_removed() {
        assert_eq!(tidy_answer("\"Outstanding Young Talent\""), "Outstanding Young Talent");
        assert_eq!(tidy_answer("《红楼梦》"), "红楼梦");
    }

    #[test]
    fn first_clause_kept() {
        assert_eq!(
            tidy_answer("Beijing, which hosted the Games in 2008"),
            "Beijing"
        );
        assert_eq!(tidy_answer("北京，中国的首都"), "北京，中国的首都");
        assert_eq!(tidy_answer("北京市，中国的首都"), "北京市");
    }

    #[test]
    fn short_first_clause_not_used() {
        assert_eq!(tidy_answer("St. Louis"), "St. Louis");
    }

    #[test]
    fn capped_at_thirty_chars() {
        let long = "Supercalifragilisticexpialidocious and more";
        assert_eq!(tidy_answer(long).chars().count(), 30);
    }

    #[test]
    fn falls_back_to_raw_prefix() {
        assert_eq!(tidy_answer("According to..."), "According to...");
        assert_eq!(tidy_answer("   "), "");
    }

    #[test]
    fn retry_triggers() {
        assert!(needs_retry(""));
        assert!(needs_retry("x"));
        assert!(needs_retry("No information available"));
        assert!(needs_retry("Based on the context"));
        assert!(!needs_retry("Beijing"));
        assert!(!needs_retry("北京"));
    }
}
