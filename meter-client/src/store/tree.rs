//! Helpers for editing the JSON tree the way the real-time database does:
//! nulls are never stored and objects left empty by a delete disappear.

use serde_json::{Map, Value};

/// Value at `segments`, treating `null` as absent.
pub fn get_at<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut cur = node;
    for seg in segments {
        cur = cur.as_object()?.get(*seg)?;
    }
    (!cur.is_null()).then_some(cur)
}

/// Replace (or with `None`, remove) the value at `segments`.
pub fn set_at(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let value = value.and_then(prune);

    let Some((head, rest)) = segments.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    let child_gone = {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        child.is_null()
    };
    if child_gone {
        map.shift_remove(*head);
    }

    let empty = map.is_empty();
    if empty {
        *node = Value::Null;
    }
}

/// Apply a multi-child update at `segments`. A `null` child deletes that child.
pub fn merge_at(node: &mut Value, segments: &[&str], patch: &Map<String, Value>) {
    for (key, value) in patch {
        let mut path = segments.to_vec();
        path.push(key.as_str());
        let value = (!value.is_null()).then(|| value.clone());
        set_at(node, &path, value);
    }
}

/// Strip nulls and empty objects. Returns `None` when nothing is left.
pub fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}
