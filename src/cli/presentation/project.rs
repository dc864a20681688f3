//! Project tree and catalog output.

use crate::project::Project;
use crate::tree::Node;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

/// Indented outline of the tree, one node per line with its attributes.
pub fn format_project_text(project: &Project) -> String {
    let tree = project.tree();
    let mut output = format!(
        "{}\nNodes: {}\nFingerprint: {}\n\n",
        format!("Project: {}", project.name()).bold(),
        tree.len(),
        tree.fingerprint()
    );
    write_node(&mut output, tree.root(), 0);
    output.trim_end().to_string()
}

fn write_node(output: &mut String, node: &Node, depth: usize) {
    output.push_str(&"  ".repeat(depth));
    output.push_str(&format!("{} {}", node.type_id().cyan(), node.name()));
    if !node.attributes().is_empty() {
        let attrs: Vec<String> = node
            .attributes()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        output.push_str(&format!(" [{}]", attrs.join(", ")));
    }
    output.push('\n');
    for child in node.children() {
        write_node(output, child, depth + 1);
    }
}

/// Process names under a heading per task group.
pub fn format_process_names(project: &str, groups: &BTreeMap<String, Vec<String>>) -> String {
    if groups.is_empty() {
        return format!("No processes stored in {}.", project);
    }
    let mut output = format!("Processes in {}:\n", project);
    let mut total = 0;
    for (group, names) in groups {
        output.push_str(&format!("  {}:\n", group));
        for name in names {
            output.push_str(&format!("    {}\n", name));
        }
        total += names.len();
    }
    output.push_str(&format!("\nTotal: {} process(es) in {} group(s)", total, groups.len()));
    output
}
