use std::collections::HashSet;

use serde_json::{Map, Value};

pub const COMPONENT_REF_PREFIX: &str = "#/components/";

const OPTIONAL_SECTIONS: [&str; 4] = ["servers", "security", "tags", "externalDocs"];

/// Reduce an interface-description document to the operations tagged with
/// any of `selected_tags` plus every component they reach.
///
/// Components are resolved to a fixed point: the full `components` section
/// is re-scanned until a pass discovers no new reference, so references
/// between components resolve regardless of their order in the document.
/// Shapes that don't fit (non-object path items, unresolvable `$ref`s) are
/// skipped, never raised.
pub fn reduce(document: &Value, selected_tags: &[String]) -> Value {
    let mut refs: HashSet<String> = HashSet::new();

    let paths = filter_paths(document.get("paths"), selected_tags, &mut refs);

    let components = document.get("components").and_then(Value::as_object);
    if let Some(components) = components {
        loop {
            let before = refs.len();
            for (kind, name, definition) in component_entries(components) {
                if refs.contains(&component_ref(kind, name)) {
                    collect_refs(definition, &mut refs);
                }
            }
            if refs.len() == before {
                break;
            }
        }
    }

    let mut result = Map::new();
    result.insert(
        "openapi".to_string(),
        document.get("openapi").cloned().unwrap_or(Value::Null),
    );
    result.insert(
        "info".to_string(),
        document.get("info").cloned().unwrap_or(Value::Null),
    );
    for key in OPTIONAL_SECTIONS {
        if let Some(section) = document.get(key) {
            result.insert(key.to_string(), section.clone());
        }
    }
    result.insert("paths".to_string(), Value::Object(paths));

    if let Some(components) = components {
        let retained = retain_components(components, &refs);
        if !retained.is_empty() {
            result.insert("components".to_string(), Value::Object(retained));
        }
    }

    Value::Object(result)
}

/// Every `$ref` string found anywhere inside `value`.
pub fn references(value: &Value) -> HashSet<String> {
    let mut refs = HashSet::new();
    collect_refs(value, &mut refs);
    refs
}

fn filter_paths(
    paths: Option<&Value>,
    selected_tags: &[String],
    refs: &mut HashSet<String>,
) -> Map<String, Value> {
    let mut filtered = Map::new();
    let Some(paths) = paths.and_then(Value::as_object) else {
        return filtered;
    };

    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };

        let mut kept = Map::new();
        for (method, operation) in item {
            if operation_matches(operation, selected_tags) {
                collect_refs(operation, refs);
                kept.insert(method.clone(), operation.clone());
            }
        }

        if !kept.is_empty() {
            filtered.insert(path.clone(), Value::Object(kept));
        }
    }

    filtered
}

fn operation_matches(operation: &Value, selected_tags: &[String]) -> bool {
    operation
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .any(|tag| selected_tags.iter().any(|selected| selected == tag))
        })
        .unwrap_or(false)
}

fn collect_refs(value: &Value, refs: &mut HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(target)) => {
                        refs.insert(target.clone());
                    }
                    _ => collect_refs(child, refs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, refs);
            }
        }
        _ => {}
    }
}

fn component_entries(
    components: &Map<String, Value>,
) -> impl Iterator<Item = (&String, &String, &Value)> {
    components
        .iter()
        .filter_map(|(kind, items)| items.as_object().map(|items| (kind, items)))
        .flat_map(|(kind, items)| items.iter().map(move |(name, def)| (kind, name, def)))
}

fn retain_components(components: &Map<String, Value>, refs: &HashSet<String>) -> Map<String, Value> {
    let mut retained = Map::new();
    for (kind, items) in components {
        let Some(items) = items.as_object() else {
            continue;
        };
        let kept: Map<String, Value> = items
            .iter()
            .filter(|(name, _)| refs.contains(&component_ref(kind, name)))
            .map(|(name, def)| (name.clone(), def.clone()))
            .collect();
        if !kept.is_empty() {
            retained.insert(kind.clone(), Value::Object(kept));
        }
    }
    retained
}

fn component_ref(kind: &str, name: &str) -> String {
    format!("{}{}/{}", COMPONENT_REF_PREFIX, kind, name)
}
