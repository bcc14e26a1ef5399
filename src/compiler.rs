use crate::config::{generate_config, CustomerConfig};
use crate::export::ContainerExport;
use crate::extractor::{extract_macro_definitions, extract_variables};
use crate::mapper::variable_to_data_layer_path;
use metrics::{counter, histogram};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Result of a complete compile run, with statistics for operator output.
#[derive(Debug)]
pub struct CompileOutcome {
    pub config: CustomerConfig,
    pub tags_scanned: usize,
    pub variables_found: usize,
    pub macro_bindings: usize,
    pub heuristic_bindings: usize,
    /// Referenced variables with neither a macro binding nor a safe
    /// heuristic mapping; these need manual attention.
    pub unmapped: Vec<String>,
}

/// Compiles a container export into a customer's config.
///
/// Macro definitions are the authoritative bindings; variables referenced by
/// tags but never defined fall back to the naming-convention mapper, and
/// what the mapper cannot resolve is reported as unmapped rather than
/// guessed. Referenced names are processed in sorted order so repeated
/// compiles of the same export produce identical artifacts.
#[instrument(skip(export))]
pub fn compile_container(customer_id: &str, export: &ContainerExport) -> CompileOutcome {
    let start = std::time::Instant::now();
    counter!("gtm_compile_runs_total").increment(1);

    let mut definitions = extract_macro_definitions(&export.macros);
    let macro_bindings = definitions.len();
    info!(
        "Extracted {} macro binding(s) from {} macro record(s)",
        macro_bindings,
        export.macros.len()
    );

    let mut referenced = HashSet::new();
    for tag in &export.tags {
        referenced.extend(extract_variables(tag));
    }
    let variables_found = referenced.len();
    info!(
        "Found {} distinct variable reference(s) across {} tag(s)",
        variables_found,
        export.tags.len()
    );

    let mut ordered: Vec<String> = referenced.into_iter().collect();
    ordered.sort();

    let mut heuristic_bindings = 0;
    let mut unmapped = Vec::new();
    for name in ordered {
        if definitions.contains(&name) {
            continue;
        }
        match variable_to_data_layer_path(&name) {
            Some(path) => {
                debug!("Heuristically mapped '{}' to '{}'", name, path);
                definitions.insert(name, path);
                heuristic_bindings += 1;
            }
            None => unmapped.push(name),
        }
    }

    let config = generate_config(customer_id, &definitions);

    counter!("gtm_events_detected_total").increment(config.events.len() as u64);
    counter!("gtm_unmapped_variables_total").increment(unmapped.len() as u64);
    histogram!("gtm_compile_duration_seconds").record(start.elapsed().as_secs_f64());

    CompileOutcome {
        config,
        tags_scanned: export.tags.len(),
        variables_found,
        macro_bindings,
        heuristic_bindings,
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heuristic_fallback_binds_undefined_camel_case_variables() {
        let export = ContainerExport::from_value(&json!({
            "tag": [{
                "name": "GA4 Purchase",
                "parameter": [
                    {"key": "value", "value": "{{ecommerceTotal}}"},
                    {"key": "label", "value": "{{Campaign Label}}"}
                ]
            }],
            "macro": []
        }));

        let outcome = compile_container("cust-1", &export);
        assert_eq!(outcome.tags_scanned, 1);
        assert_eq!(outcome.variables_found, 2);
        assert_eq!(outcome.macro_bindings, 0);
        assert_eq!(outcome.heuristic_bindings, 1);
        assert_eq!(outcome.unmapped, vec!["Campaign Label".to_string()]);
    }

    #[test]
    fn macro_bindings_take_precedence_over_heuristics() {
        let export = ContainerExport::from_value(&json!({
            "tag": [{
                "name": "FB Purchase",
                "parameter": [{"key": "value", "value": "{{ecommerceTotal}}"}]
            }],
            "macro": [{
                "name": "ecommerceTotal",
                "parameter": [{"key": "dataLayerVariable", "value": "transaction.amount"}]
            }]
        }));

        let outcome = compile_container("cust-2", &export);
        assert_eq!(outcome.macro_bindings, 1);
        assert_eq!(outcome.heuristic_bindings, 0);
    }

    #[test]
    fn empty_export_still_compiles_an_empty_config() {
        let outcome = compile_container("cust-3", &ContainerExport::default());
        assert!(outcome.config.events.is_empty());
        assert_eq!(outcome.config.customer_id, "cust-3");
        assert_eq!(outcome.config.version, "1.0.0");
    }
}
