use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// A record id exactly as it appeared in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Text(s) => f.write_str(s),
            RecordId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub id: RecordId,
    pub query: String,
    pub expected: Option<String>,
}

/// Names of the input object fields to read.
#[derive(Debug, Clone)]
pub struct InputFields {
    pub id: String,
    pub query: String,
    pub expected: Option<String>,
}

impl Default for InputFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            query: "query".to_string(),
            expected: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input must be a JSON array of objects")]
    NotArray,

    #[error("element {index} is not an object")]
    NotObject { index: usize },

    #[error("element {index}: missing field \"{field}\"")]
    MissingField { index: usize, field: String },

    #[error("element {index}: field \"{field}\" {reason}")]
    InvalidField {
        index: usize,
        field: String,
        reason: &'static str,
    },
}

pub fn load_records(path: &Path, fields: &InputFields) -> Result<Vec<QueryRecord>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text, fields)
}

/// Parses and validates the whole input up front; the first bad element aborts.
pub fn parse_records(text: &str, fields: &InputFields) -> Result<Vec<QueryRecord>, InputError> {
    let Value::Array(elements) = serde_json::from_str::<Value>(text)? else {
        return Err(InputError::NotArray);
    };

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(elements.len());

    for (index, element) in elements.into_iter().enumerate() {
        let Value::Object(mut obj) = element else {
            return Err(InputError::NotObject { index });
        };
        let missing = |field: &str| InputError::MissingField {
            index,
            field: field.to_string(),
        };
        let invalid = |field: &str, reason| InputError::InvalidField {
            index,
            field: field.to_string(),
            reason,
        };

        let id = match obj.remove(&fields.id) {
            None | Some(Value::Null) => return Err(missing(&fields.id)),
            Some(Value::String(s)) => RecordId::Text(s),
            Some(Value::Number(n)) => RecordId::Number(n),
            Some(_) => return Err(invalid(&fields.id, "must be a string or number")),
        };

        let query = match obj.remove(&fields.query) {
            None | Some(Value::Null) => return Err(missing(&fields.query)),
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::String(_)) => return Err(invalid(&fields.query, "is empty")),
            Some(_) => return Err(invalid(&fields.query, "must be a string")),
        };

        let expected = match fields.expected.as_deref().and_then(|f| obj.remove(f)) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                let field = fields.expected.as_deref().unwrap_or_default();
                return Err(invalid(field, "must be a string or number"));
            }
        };

        if !seen.insert(id.clone()) {
            warn!(%id, index, "duplicate record id");
        }
        records.push(QueryRecord {
            id,
            query,
            expected,
        });
    }

    Ok(records)
}
