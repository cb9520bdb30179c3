//! Scope filter construction.
//!
//! Builds the conjunctive exact-match predicate that restricts a search to
//! one (semester, subject, unit) triple, and renders it in the Qdrant
//! filter dialect.

use serde_json::{Value, json};
use syllabot_core::retrieval::{FieldMatch, Scope, ScopeFilter};

/// Payload field that holds passage metadata in the default collection layout.
pub const DEFAULT_METADATA_KEY: &str = "metadata";

/// Build the filter for `scope` against the default metadata field.
///
/// Pure: equal scopes always produce equal filters.
pub fn scope_filter(scope: &Scope) -> ScopeFilter {
    scope_filter_with_key(DEFAULT_METADATA_KEY, scope)
}

/// Build the filter for `scope` against a custom metadata field.
pub fn scope_filter_with_key(metadata_key: &str, scope: &Scope) -> ScopeFilter {
    ScopeFilter {
        must: vec![
            FieldMatch {
                key: format!("{metadata_key}.semester"),
                value: json!(scope.semester),
            },
            FieldMatch {
                key: format!("{metadata_key}.subject"),
                value: json!(scope.subject),
            },
            FieldMatch {
                key: format!("{metadata_key}.unit"),
                value: json!(scope.unit),
            },
        ],
    }
}

/// Render a filter as a Qdrant `Filter` object.
pub fn to_qdrant(filter: &ScopeFilter) -> Value {
    let must: Vec<Value> = filter
        .must
        .iter()
        .map(|cond| json!({ "key": cond.key, "match": { "value": cond.value } }))
        .collect();
    json!({ "must": must })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exactly_three_metadata_keys() {
        let filter = scope_filter(&Scope::new(3, "aoa", 2));
        let keys: Vec<&str> = filter.must.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["metadata.semester", "metadata.subject", "metadata.unit"]
        );
        assert_eq!(filter.must[0].value, json!(3));
        assert_eq!(filter.must[1].value, json!("aoa"));
        assert_eq!(filter.must[2].value, json!(2));
    }

    #[test]
    fn equal_scopes_give_equal_filters() {
        let a = scope_filter(&Scope::new(5, "os", 4));
        let b = scope_filter(&Scope::new(5, "os", 4));
        assert_eq!(a, b);
        assert_ne!(a, scope_filter(&Scope::new(5, "os", 5)));
    }

    #[test]
    fn custom_metadata_key() {
        let filter = scope_filter_with_key("meta", &Scope::new(1, "m1", 1));
        assert_eq!(filter.must[0].key, "meta.semester");
    }

    #[test]
    fn qdrant_rendering() {
        let rendered = to_qdrant(&scope_filter(&Scope::new(3, "aoa", 2)));
        assert_eq!(
            rendered,
            json!({
                "must": [
                    { "key": "metadata.semester", "match": { "value": 3 } },
                    { "key": "metadata.subject", "match": { "value": "aoa" } },
                    { "key": "metadata.unit", "match": { "value": 2 } },
                ]
            })
        );
    }
}
