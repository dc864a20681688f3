//! Registry listing.

use crate::plugin::Registries;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde_json::json;

pub fn format_types_text(registries: &Registries) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Kind", "Type", "Base"]);
    for type_id in registries.nodes.list_types() {
        let base = registries.nodes.base_type(&type_id).unwrap_or_else(|| "-".to_string());
        table.add_row(vec!["node".to_string(), type_id, base]);
    }
    for type_id in registries.calculators.list_types() {
        table.add_row(vec!["calculator".to_string(), type_id, "-".to_string()]);
    }
    format!(
        "{}\n\nTotal: {} node type(s), {} calculator type(s)",
        table,
        registries.nodes.len(),
        registries.calculators.len()
    )
}

pub fn format_types_json(registries: &Registries) -> String {
    let nodes: Vec<_> = registries
        .nodes
        .list_types()
        .map(|type_id| {
            json!({
                "type_id": type_id,
                "base_type": registries.nodes.base_type(&type_id),
            })
        })
        .collect();
    let calculators: Vec<String> = registries.calculators.list_types().collect();
    let out = json!({ "nodes": nodes, "calculators": calculators });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
