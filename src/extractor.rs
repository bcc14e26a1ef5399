use crate::constants::DATA_LAYER_VARIABLE_KEY;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

static VARIABLE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").unwrap());

/// Ordered macro-name → dataLayer-path bindings extracted from a container.
///
/// An ordered vector rather than a hash map so that downstream
/// case-insensitive candidate matching is deterministic. Re-inserting an
/// existing name overwrites its path in place (last write wins, first
/// insertion position kept).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroDefinitions(Vec<(String, String)>);

impl MacroDefinitions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) {
        let name = name.into();
        let path = path.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = path,
            None => self.0.push((name, path)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, path)| path.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, path)| (name.as_str(), path.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for MacroDefinitions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut defs = Self::new();
        for (name, path) in iter {
            defs.insert(name, path);
        }
        defs
    }
}

/// Extracts every `{{variable}}` reference from a tag's parameter tree.
///
/// Walks string, array, and object parameter values recursively; other value
/// kinds (numbers, booleans, null) carry no references and are skipped.
/// Results are trimmed and deduplicated; discovery order is not preserved.
pub fn extract_variables(tag: &Value) -> HashSet<String> {
    let mut found = HashSet::new();
    if let Some(parameters) = tag.get("parameter").and_then(Value::as_array) {
        for parameter in parameters {
            collect_references(parameter, &mut found);
        }
    }
    found
}

fn collect_references(value: &Value, found: &mut HashSet<String>) {
    match value {
        Value::String(text) => {
            for capture in VARIABLE_REF.captures_iter(text) {
                let name = capture[1].trim();
                if !name.is_empty() {
                    found.insert(name.to_string());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        Value::Object(entries) => {
            for entry in entries.values() {
                collect_references(entry, found);
            }
        }
        // Numbers, booleans and nulls cannot carry references
        _ => {}
    }
}

/// Extracts macro-name → dataLayer-path bindings from a container's macro
/// (v1) or variable (v2) records.
///
/// Only records carrying a `dataLayerVariable` parameter yield a binding;
/// macros of other kinds cannot be resolved by extraction alone and fall
/// back to heuristic mapping or remain unmapped. Malformed records are
/// skipped rather than failing the compile.
pub fn extract_macro_definitions(macros: &[Value]) -> MacroDefinitions {
    let mut definitions = MacroDefinitions::new();

    for record in macros {
        let Some(name) = record.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(parameters) = record.get("parameter").and_then(Value::as_array) else {
            continue;
        };
        if parameters.is_empty() {
            continue;
        }

        let path = parameters.iter().find_map(|parameter| {
            if parameter.get("key").and_then(Value::as_str) == Some(DATA_LAYER_VARIABLE_KEY) {
                parameter.get("value").and_then(Value::as_str)
            } else {
                None
            }
        });

        match path {
            Some(path) if !path.is_empty() => {
                debug!("Bound macro '{}' to dataLayer path '{}'", name, path);
                definitions.insert(name, path);
            }
            _ => {}
        }
    }

    definitions
}
