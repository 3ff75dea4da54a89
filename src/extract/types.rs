use serde::Serialize;

/// A query decomposed into the pieces the search and synthesis steps need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintSet {
    pub core_entity: String,
    pub time_constraint: Option<String>,
    /// Insertion-ordered and unique (case-insensitive).
    pub key_features: Vec<String>,
    /// The bare question with background removed; what the synthesizer answers.
    pub core_question: String,
}

impl ConstraintSet {
    /// Constraint set that treats the whole text as the entity and the question.
    pub fn verbatim(text: &str) -> Self {
        let text = text.trim().to_string();
        Self {
            core_entity: text.clone(),
            time_constraint: None,
            key_features: Vec::new(),
            core_question: text,
        }
    }
}
