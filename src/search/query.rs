use crate::extract::ConstraintSet;

/// Search string for a constraint set: the core entity, then each key feature
/// and the time constraint not already contained in what precedes it.
pub fn build_query(constraints: &ConstraintSet) -> String {
    let entity = constraints.core_entity.trim();
    let mut parts = vec![entity];
    let mut covered = entity.to_lowercase();

    for term in constraints
        .key_features
        .iter()
        .chain(constraints.time_constraint.iter())
    {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let lower = term.to_lowercase();
        if covered.contains(&lower) {
            continue;
        }
        covered.push(' ');
        covered.push_str(&lower);
        parts.push(term);
    }

    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}
