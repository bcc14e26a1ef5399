use serde_json::Value;

/// Safe nested lookup over an untyped dataLayer snapshot.
///
/// Descends `value` key by key along a dot-delimited path and returns `None`
/// as soon as an intermediate value is null, a non-object, or a missing key.
/// Live snapshots are untrusted and may omit arbitrary branches, so this
/// never panics and never allocates beyond the path split.
pub fn get_from_data_layer<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        match current.get(key) {
            Some(next) if !next.is_null() => current = next,
            _ => return None,
        }
    }
    Some(current)
}

/// Returns the first path in `paths` that resolves to a non-null value.
/// First match wins; this is a fallback chain, not a merge. `None` means
/// no path resolved.
pub fn get_first_valid_path<'a>(value: &Value, paths: &[&'a str]) -> Option<&'a str> {
    paths
        .iter()
        .find(|path| get_from_data_layer(value, path).is_some())
        .copied()
}

/// True when `path` resolves to a non-null value in the snapshot.
pub fn path_exists(value: &Value, path: &str) -> bool {
    get_from_data_layer(value, path).is_some()
}
