use crate::constants::KNOWN_DATA_LAYER_PREFIXES;
use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+([A-Z][a-z]*)*$").unwrap());

/// Heuristic conversion from a GTM variable's display name to a dataLayer
/// dot-path, used only when the variable has no macro-defined binding.
///
/// Rules are evaluated top to bottom and the first match wins; the ordering
/// is load-bearing since a name can match several rules. `None` means
/// "could not auto-map" (requires manual mapping), never "maps to root".
pub fn variable_to_data_layer_path(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Rule 1: already dot-notated. Normalize case and strip whitespace.
    if trimmed.contains('.') {
        let path: String = trimmed
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        return Some(path);
    }

    // Rule 2: camelCase names split into path segments.
    if CAMEL_CASE.is_match(trimmed) && trimmed.chars().any(|c| c.is_ascii_uppercase()) {
        return Some(split_camel_case(trimmed));
    }

    // Rule 3: spaced custom labels are ambiguous, no safe automatic mapping.
    if trimmed.contains(' ') {
        return None;
    }

    // Rule 4: names under a known dataLayer prefix pass through lower-cased.
    let lowered = trimmed.to_lowercase();
    if KNOWN_DATA_LAYER_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Some(lowered);
    }

    // Rule 5: unknown naming convention.
    None
}

fn split_camel_case(name: &str) -> String {
    let mut path = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            path.push('.');
            path.push(c.to_ascii_lowercase());
        } else {
            path.push(c);
        }
    }
    path.trim_start_matches('.').to_string()
}

/// Applies the heuristic per name, keeping unmappable names as `None`.
pub fn map_variables_to_data_layer<'a, I>(names: I) -> Vec<(String, Option<String>)>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| (name.to_string(), variable_to_data_layer_path(name)))
        .collect()
}
