use serde_json::Value;
use tracing::warn;

/// Which record array the export supplied its variable definitions under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroSource {
    /// GTM v1 exports: a top-level `macro` array.
    MacroV1,
    /// GTM v2 / server-side exports: a top-level `variable` array.
    VariableV2,
    Absent,
}

/// A GTM container export with its duck-typed shape resolved once.
///
/// Exports arrive either as a bare object with `tag`/`macro`/`variable`
/// arrays or with the same nested under `containerVersion`. Missing or
/// non-array fields degrade to empty vectors so a compile can still produce
/// a (possibly empty) config instead of aborting.
#[derive(Debug, Clone, Default)]
pub struct ContainerExport {
    pub tags: Vec<Value>,
    pub macros: Vec<Value>,
    pub macro_source: MacroSource,
}

impl Default for MacroSource {
    fn default() -> Self {
        MacroSource::Absent
    }
}

impl ContainerExport {
    /// Parses export text; unparsable JSON degrades to an empty export.
    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(document) => Self::from_value(&document),
            Err(e) => {
                warn!("Unparsable container export, compiling empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_value(document: &Value) -> Self {
        // Both shapes carry the same body; unwrap the v2 wrapper if present.
        let body = document.get("containerVersion").unwrap_or(document);

        let tags = array_field(body, "tag");
        if tags.is_empty() {
            warn!("Container export has no tag array");
        }

        let (macros, macro_source) = if body.get("macro").map_or(false, Value::is_array) {
            (array_field(body, "macro"), MacroSource::MacroV1)
        } else if body.get("variable").map_or(false, Value::is_array) {
            (array_field(body, "variable"), MacroSource::VariableV2)
        } else {
            (Vec::new(), MacroSource::Absent)
        };

        Self {
            tags,
            macros,
            macro_source,
        }
    }
}

fn array_field(body: &Value, key: &str) -> Vec<Value> {
    body.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
