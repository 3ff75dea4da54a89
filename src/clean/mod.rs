//! Turns raw search results into evidence: markup and boilerplate stripped,
//! near-empty snippets dropped, duplicates across sources removed.
//!
//! Survivors keep discovery order. Since results arrive Google first, then
//! Baidu, the first-seen copy of a duplicate is the Google one.

pub mod text;
pub mod url_normalize;

pub use url_normalize::normalize_url;

use std::collections::HashSet;

use tracing::debug;

use crate::search::SearchItem;
use text::{canonical, strip_boilerplate, strip_markup, trigram_similarity};

#[derive(Debug, Clone, Copy)]
pub struct CleanPolicy {
    /// Snippets with fewer characters than this after cleaning are dropped.
    pub min_snippet_chars: usize,
    /// Trigram Jaccard similarity at or above which two snippets are duplicates.
    pub similarity_threshold: f64,
}

impl Default for CleanPolicy {
    fn default() -> Self {
        Self {
            min_snippet_chars: 10,
            similarity_threshold: 0.9,
        }
    }
}

pub fn clean_evidence(items: Vec<SearchItem>, policy: &CleanPolicy) -> Vec<SearchItem> {
    let raw = items.len();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut kept: Vec<(SearchItem, String)> = Vec::new();

    for mut item in items {
        item.title = strip_markup(&item.title);
        item.snippet = strip_boilerplate(&strip_markup(&item.snippet));
        item.url = item.url.trim().to_string();

        if item.snippet.chars().count() < policy.min_snippet_chars {
            continue;
        }

        if !item.url.is_empty() && !seen_urls.insert(normalize_url(&item.url)) {
            continue;
        }

        let key = canonical(&item.snippet);
        let duplicate = kept.iter().any(|(_, other)| {
            *other == key || trigram_similarity(other, &key) >= policy.similarity_threshold
        });
        if duplicate {
            continue;
        }

        kept.push((item, key));
    }

    debug!(raw, kept = kept.len(), "evidence cleaned");
    kept.into_iter().map(|(item, _)| item).collect()
}
