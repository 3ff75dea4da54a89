use serde::Deserialize;
use serde_json::Value;

use super::types::ConstraintSet;

pub(crate) const MAX_KEY_FEATURES: usize = 10;
const MIN_QUESTION_CHARS: usize = 3;
const LEAD_INS: &[&str] = &["Output:", "Answer:", "JSON:", "Result:"];

#[derive(Debug, Deserialize)]
struct RawConstraints {
    #[serde(default)]
    core_entity: Option<Value>,
    #[serde(default)]
    time_constraint: Option<Value>,
    #[serde(default)]
    key_features: Option<Value>,
    #[serde(default)]
    core_question: Option<Value>,
}

/// Validates a model reply into a [`ConstraintSet`].
///
/// Tolerates code fences, a leading label and prose around the object, but the
/// object itself must parse and carry a non-empty `core_entity`.
pub(crate) fn parse_constraints(reply: &str, query: &str) -> Result<ConstraintSet, String> {
    let object = locate_object(reply).ok_or_else(|| format!("no JSON object in reply: {}", preview(reply)))?;
    let raw: RawConstraints =
        serde_json::from_str(object).map_err(|e| format!("invalid constraint JSON: {e}"))?;

    let core_entity = raw
        .core_entity
        .as_ref()
        .and_then(scalar_text)
        .ok_or_else(|| "missing core_entity".to_string())?;

    let time_constraint = raw.time_constraint.as_ref().and_then(scalar_text);

    let key_features = raw
        .key_features
        .as_ref()
        .map(feature_list)
        .unwrap_or_default();

    let core_question = raw
        .core_question
        .as_ref()
        .and_then(scalar_text)
        .map(|q| q.trim_end_matches(['?', '？', '.', '。']).trim().to_string())
        .filter(|q| q.chars().count() >= MIN_QUESTION_CHARS)
        .unwrap_or_else(|| query.trim().to_string());

    Ok(ConstraintSet {
        core_entity,
        time_constraint,
        key_features,
        core_question,
    })
}

fn locate_object(reply: &str) -> Option<&str> {
    let mut text = reply.trim();
    for lead in LEAD_INS {
        if let Some(rest) = text.strip_prefix(lead) {
            text = rest.trim_start();
            break;
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty() && !text.eq_ignore_ascii_case("null") && !text.eq_ignore_ascii_case("none"))
        .then_some(text)
}

fn feature_list(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => s
            .split([',', '，', ';'])
            .map(|part| part.trim().to_string())
            .collect(),
        _ => Vec::new(),
    };

    let mut features: Vec<String> = Vec::new();
    for candidate in candidates {
        if candidate.chars().count() < 2 {
            continue;
        }
        if features.iter().any(|f| f.eq_ignore_ascii_case(&candidate)) {
            continue;
        }
        features.push(candidate);
        if features.len() == MAX_KEY_FEATURES {
            break;
        }
    }
    features
}

fn preview(text: &str) -> &str {
    &text[..text.floor_char_boundary(120)]
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: &str = "Which city hosted the 2008 Summer Olympics?";

    #[test]
    fn parses_plain_object() {
        let reply = r#"{"core_entity":"2008 Summer Olympics","time_constraint":"2008","key_features":["host city","Olympics"],"core_question":"Which city hosted the Olympics?"}"#;
        let set = parse_constraints(reply, QUERY).unwrap();
        assert_eq!(set.core_entity, "2008 Summer Olympics");
        assert_eq!(set.time_constraint.as_deref(), Some("2008"));
        assert_eq!(set.key_features, vec!["host city", "Olympics"]);
        assert_eq!(set.core_question, "Which city hosted the Olympics");
    }

    #[test]
    fn strips_code_fence_and_label() {
        let reply = "Output: ```json\n{\"core_entity\": \"Ringo Sheena\"}\n```";
        let set = parse_constraints(reply, QUERY).unwrap();
        assert_eq!(set.core_entity, "Ringo Sheena");
        assert!(set.time_constraint.is_none());
        assert!(set.key_features.is_empty());
    }

    #[test]
    fn numeric_year_becomes_text() {
        let reply = r#"{"core_entity":"Olympics","time_constraint":2008}"#;
        let set = parse_constraints(reply, QUERY).unwrap();
        assert_eq!(set.time_constraint.as_deref(), Some("2008"));
    }

    #[test]
    fn null_like_time_is_none() {
        for time in [r#"null"#, r#""""#, r#""none""#] {
            let reply = format!(r#"{{"core_entity":"x y","time_constraint":{time}}}"#);
            let set = parse_constraints(&reply, QUERY).unwrap();
            assert!(set.time_constraint.is_none(), "time {time}");
        }
    }

    #[test]
    fn features_from_comma_string_deduplicated_and_capped() {
        let many: Vec<String> = (0..15).map(|i| format!("kw{i}")).collect();
        let reply = format!(
            r#"{{"core_entity":"e","key_features":"Opera, opera, a, {}"}}"#,
            many.join(", ")
        );
        let set = parse_constraints(&reply, QUERY).unwrap();
        assert_eq!(set.key_features.len(), MAX_KEY_FEATURES);
        assert_eq!(set.key_features[0], "Opera");
        assert!(!set.key_features.iter().any(|f| f == "a"));
    }

    #[test]
    fn short_or_missing_question_falls_back_to_query() {
        let reply = r#"{"core_entity":"e","core_question":"?"}"#;
        let set = parse_constraints(reply, QUERY).unwrap();
        assert_eq!(set.core_question, QUERY);
    }

    #[test]
    fn missing_entity_is_error() {
        let err = parse_constraints(r#"{"time_constraint":"2008"}"#, QUERY).unwrap_err();
        assert!(err.contains("core_entity"));
    }

    #[test]
    fn prose_without_object_is_error() {
        let err = parse_constraints("I cannot help with that.", QUERY).unwrap_err();
        assert!(err.contains("no JSON object"));
    }

    #[test]
    fn broken_json_is_error() {
        let err = parse_constraints(r#"{"core_entity": "x",}"#, QUERY).unwrap_err();
        assert!(err.contains("invalid constraint JSON"));
    }
}
