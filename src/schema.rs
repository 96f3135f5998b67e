//! Sub-schema lookup over a JSON-Schema-like tree.
//!
//! The resolver answers one question for the healer: which schema node
//! governs the frame at a given depth of the nesting stack? The walk follows
//! `properties[current_key]` for object descents and `items` for array
//! descents, resolving fragment-local `$ref` pointers lazily at every hop.
//! Anything it cannot determine is reported as unknown (`None`); the healer
//! then closes the affected frame without injection.

use std::collections::HashSet;

use serde_json::Value;

use crate::healer::Frame;

/// The sub-schema governing the frame at `depth`, or `None` when the path
/// cannot be resolved (missing `properties`/`items`, broken `$ref`, or a
/// frame with no current key).
pub(crate) fn subschema_at<'a>(
    root: &'a Value,
    stack: &[Frame],
    depth: usize,
    max_hops: usize,
) -> Option<&'a Value> {
    let mut current = deref(root, root, max_hops)?;
    for frame in &stack[..depth] {
        let child = if frame.is_object {
            let key = frame.current_key.as_deref()?;
            current.get("properties")?.get(key)?
        } else {
            current.get("items")?
        };
        current = deref(root, child, max_hops)?;
    }
    Some(current)
}

/// Serialized `"key":value` entries for every `required` name of `sub`
/// missing from `keys_seen`, joined by `,` in `required` order. Empty when
/// nothing is missing or `sub` declares no `required` array.
pub(crate) fn injection_for(
    root: &Value,
    sub: &Value,
    keys_seen: &HashSet<String>,
    max_hops: usize,
) -> String {
    let Some(required) = sub.get("required").and_then(Value::as_array) else {
        return String::new();
    };
    let mut entries: Vec<String> = Vec::new();
    for name in required.iter().filter_map(Value::as_str) {
        if keys_seen.contains(name) {
            continue;
        }
        let value = match default_for(root, sub, name, max_hops) {
            Some(v) => v.to_string(),
            None => "null".to_owned(),
        };
        let key = Value::String(name.to_owned()).to_string();
        entries.push(format!("{key}:{value}"));
    }
    entries.join(",")
}

/// The `default` declared for `sub.properties[key]`, looked up through any
/// `$ref` chain.
fn default_for<'a>(
    root: &'a Value,
    sub: &'a Value,
    key: &str,
    max_hops: usize,
) -> Option<&'a Value> {
    let prop = sub.get("properties")?.get(key)?;
    deref(root, prop, max_hops)?.get("default")
}

/// Follow `$ref` until a concrete node is reached, bounded by `max_hops` so
/// reference cycles terminate as unknown.
fn deref<'a>(root: &'a Value, node: &'a Value, max_hops: usize) -> Option<&'a Value> {
    let mut current = node;
    let mut hops = 0usize;
    while let Some(target) = current.get("$ref").and_then(Value::as_str) {
        if hops >= max_hops {
            return None;
        }
        current = lookup_pointer(root, target)?;
        hops += 1;
    }
    Some(current)
}

/// Resolve a fragment-local pointer such as `#/definitions/User`,
/// `#/$defs/User`, or `#/components/schemas/User` against the schema root.
fn lookup_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.strip_prefix("#/")?;
    let mut current = root;
    for segment in path.split('/') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Recursively remove `default` keys from a schema. Upstream APIs commonly
/// reject `default` in response-format schemas, so the proxy strips them
/// before forwarding.
pub fn strip_defaults(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("default");
            for child in map.values_mut() {
                strip_defaults(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_defaults(child);
            }
        }
        _ => {}
    }
}
