use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Google,
    Baidu,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Google => f.write_str("google"),
            Source::Baidu => f.write_str("baidu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchItem {
    pub source: Source,
    pub title: String,
    pub snippet: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

impl SearchItem {
    pub fn new(
        source: Source,
        title: impl Into<String>,
        snippet: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
            published: None,
        }
    }
}
