//! Identifier extraction from a create batch.

use indexmap::IndexSet;
use serde_json::Value;

use crate::{executor::BatchResult, metric::InvocationOutcome};

/// Default JSON field that carries a created entity's identifier.
pub const DEFAULT_ID_FIELD: &str = "uid";

/// Collects the identifiers of every successfully created entity.
///
/// Outcomes that failed, carry no JSON object, or lack `field` are skipped;
/// they already count as failures (or opaque successes) in the stage summary.
/// String values are taken as-is and numbers in their JSON text form. Duplicates
/// collapse to the first occurrence, so the result is independent of how often
/// the subject repeats an identifier.
pub fn extract_identifiers(batch: &BatchResult, field: &str) -> Vec<String> {
    batch
        .outcomes
        .iter()
        .filter_map(|outcome| identifier(outcome, field))
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn identifier(outcome: &InvocationOutcome, field: &str) -> Option<String> {
    if !outcome.success {
        return None;
    }
    match outcome.payload.as_ref()?.as_json()?.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metric::Payload, workload::WorkloadKind};
    use serde_json::json;
    use std::{collections::BTreeSet, time::Duration};

    fn created(value: Value) -> InvocationOutcome {
        InvocationOutcome::succeeded(Payload::Json(value), Duration::from_millis(5))
    }

    fn batch(outcomes: Vec<InvocationOutcome>) -> BatchResult {
        BatchResult {
            kind: WorkloadKind::Create,
            outcomes,
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn extracts_from_successful_objects_only() {
        let batch = batch(vec![
            created(json!({"uid": "a2b3k9", "title": "one"})),
            InvocationOutcome::failed("boom", Duration::ZERO),
            created(json!({"title": "no uid"})),
            InvocationOutcome::succeeded(Payload::Raw("Task added".into()), Duration::ZERO),
            created(json!([{"uid": "inside-array"}])),
            created(json!({"uid": 42})),
            created(json!({"uid": null})),
            created(json!({"uid": ""})),
        ]);

        assert_eq!(extract_identifiers(&batch, "uid"), vec!["a2b3k9", "42"]);
    }

    #[test]
    fn duplicates_collapse() {
        let batch = batch(vec![
            created(json!({"uid": "x"})),
            created(json!({"uid": "y"})),
            created(json!({"uid": "x"})),
        ]);

        assert_eq!(extract_identifiers(&batch, "uid"), vec!["x", "y"]);
    }

    #[test]
    fn permutation_yields_same_set() {
        let outcomes: Vec<_> = (0..10).map(|i| created(json!({"uid": format!("id{i}")}))).collect();
        let mut reversed = outcomes.clone();
        reversed.reverse();

        let forward: BTreeSet<_> = extract_identifiers(&batch(outcomes), "uid").into_iter().collect();
        let backward: BTreeSet<_> = extract_identifiers(&batch(reversed), "uid").into_iter().collect();
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 10);
    }

    #[test]
    fn custom_field_name() {
        let batch = batch(vec![created(json!({"id": "7", "uid": "ignored"}))]);
        assert_eq!(extract_identifiers(&batch, "id"), vec!["7"]);
    }
}
