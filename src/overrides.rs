//! `x-swagger-override` handling
//!
//! A document may carry a fragment under `x-swagger-override` that is shaped
//! like the document itself. The fragment is removed and merged over the rest
//! of the document before anything else reads it.

use serde_json::Value;

use crate::error::MergeError;
use crate::merge::merge_values;

/// Reserved top-level key holding the override fragment.
pub const OVERRIDE_KEY: &str = "x-swagger-override";

/// Apply the override fragment embedded in `raw`, if any.
///
/// Without the key the input comes back untouched.
pub fn resolve_overrides(raw: &str) -> Result<String, MergeError> {
    let doc: Value = serde_json::from_str(raw).map_err(MergeError::Data)?;
    if doc.get(OVERRIDE_KEY).is_none() {
        return Ok(raw.to_owned());
    }

    serde_json::to_string(&resolve_overrides_value(doc)).map_err(MergeError::Encode)
}

/// Value-level form of [`resolve_overrides`].
pub fn resolve_overrides_value(mut doc: Value) -> Value {
    let fragment = match doc.as_object_mut() {
        Some(fields) => fields.remove(OVERRIDE_KEY),
        None => None,
    };

    match fragment {
        Some(fragment) => merge_values(&doc, &fragment),
        None => doc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_overrides_merges_fragment_and_removes_key() {
        let raw = json!({
            "x-swagger-override": {
                "paths": { "/abort": { "get": { "x-swagger-cmd": "abort" } } }
            },
            "paths": {
                "/override": { "get": { "whatever": ["normally", "goes", "here"] } },
                "/abort": { "get": { "whatever": ["normally", "goes", "here"] } }
            }
        })
        .to_string();

        let resolved: Value = serde_json::from_str(&resolve_overrides(&raw).unwrap()).unwrap();

        assert_eq!(
            resolved["paths"]["/abort"]["get"]["whatever"],
            json!(["normally", "goes", "here"])
        );
        assert_eq!(resolved["paths"]["/abort"]["get"]["x-swagger-cmd"], "abort");
        assert!(resolved.get(OVERRIDE_KEY).is_none());
        assert!(resolved["paths"]["/override"]["get"].get("x-swagger-cmd").is_none());
    }

    #[test]
    fn resolve_overrides_without_key_returns_input_unchanged() {
        let raw = r#"{ "paths" : {}, "swagger": "2.0" }"#;
        assert_eq!(resolve_overrides(raw).unwrap(), raw);
    }

    #[test]
    fn resolve_overrides_rejects_invalid_json() {
        let err = resolve_overrides("{").unwrap_err();
        assert!(matches!(err, MergeError::Data(_)));
    }

    #[test]
    fn resolve_overrides_value_adds_new_operations() {
        let doc = json!({
            "paths": { "/a": { "get": { "summary": "a" } } },
            "x-swagger-override": { "paths": { "/b": { "get": { "summary": "b" } } } }
        });

        let resolved = resolve_overrides_value(doc);
        assert_eq!(
            resolved,
            json!({
                "paths": {
                    "/a": { "get": { "summary": "a" } },
                    "/b": { "get": { "summary": "b" } }
                }
            })
        );
    }

    #[test]
    fn resolve_overrides_value_ignores_non_object_documents() {
        let doc = json!([1, 2, 3]);
        assert_eq!(resolve_overrides_value(doc.clone()), doc);
    }
}
