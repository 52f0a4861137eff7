//! Field patch application shared by document store adapters.

use serde_json::{Map, Value};

use crate::ports::FieldPatch;

/// Writes every patch entry into `doc`. Keys containing `/` address nested
/// objects, which are created when missing. A `null` value removes the
/// field. A non-object document is replaced by an empty object first.
pub fn apply_patch(doc: &mut Value, patch: &FieldPatch) {
    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }

    for (path, value) in patch {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(leaf) = segments.pop() else {
            continue;
        };

        let mut node = &mut *doc;
        for segment in segments {
            let Value::Object(map) = node else {
                break;
            };
            let child = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = child;
        }

        if let Value::Object(map) = node {
            if value.is_null() {
                map.remove(leaf);
            } else {
                map.insert(leaf.to_string(), value.clone());
            }
        }
    }
}
