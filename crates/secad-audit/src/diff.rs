//! Field-level diff of serialized records
//!
//! Objects are compared key by key at the top level. A field that is `null`
//! counts as absent. Any other JSON value is compared as a single field named
//! [`VALUE_FIELD`].

use crate::entry::FieldChange;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Field name used when the compared values are not objects
pub const VALUE_FIELD: &str = "value";

/// Changed fields between `before` and `after`, sorted by field name
#[must_use]
pub fn diff_values(before: &Value, after: &Value) -> Vec<FieldChange> {
    match (as_object(before), as_object(after)) {
        (Some(old), Some(new)) => diff_objects(&old, &new),
        _ => {
            let old = present(Some(before));
            let new = present(Some(after));
            if old == new {
                Vec::new()
            } else {
                vec![FieldChange {
                    field: VALUE_FIELD.to_string(),
                    old_value: old.cloned(),
                    new_value: new.cloned(),
                }]
            }
        }
    }
}

fn diff_objects(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<FieldChange> {
    let fields: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let old_value = present(old.get(field));
            let new_value = present(new.get(field));
            (old_value != new_value).then(|| FieldChange {
                field: field.clone(),
                old_value: old_value.cloned(),
                new_value: new_value.cloned(),
            })
        })
        .collect()
}

/// Objects diff as themselves; `null` diffs as an empty object
fn as_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}
