//! Template synthesis — render a declared graph into the static JSON
//! document handed to the provisioning engine.
//!
//! Rendering is pure: no provider calls, no secret values, no I/O beyond
//! the optional atomic write. The canonical rendering is fingerprinted with
//! BLAKE3 so operators can tell whether a synthesized template changed.

use super::env::DeployTarget;
use super::graph::ResourceGraph;
use serde_json::json;
use std::path::Path;

/// Template schema version.
pub const FORMAT_VERSION: &str = "1.0";

/// Render a graph into a deployment template.
///
/// Fails on unknown depends_on references or dependency cycles; reference
/// validation beyond ordering is the caller's job (`ResourceGraph::validate`).
pub fn render(graph: &ResourceGraph, target: &DeployTarget) -> Result<serde_json::Value, String> {
    let order = graph.execution_order()?;

    let mut resources = serde_json::Map::new();
    for (id, decl) in graph.resources() {
        let value = serde_json::to_value(decl)
            .map_err(|e| format!("cannot serialize resource '{}': {}", id, e))?;
        resources.insert(id.clone(), value);
    }

    let mut parameters = serde_json::Map::new();
    for (key, value) in graph.registry().iter() {
        parameters.insert(
            key.clone(),
            serde_json::to_value(value).map_err(|e| format!("serialize error: {}", e))?,
        );
    }

    let mut outputs = serde_json::Map::new();
    for (name, value) in graph.outputs() {
        outputs.insert(
            name.clone(),
            serde_json::to_value(value).map_err(|e| format!("serialize error: {}", e))?,
        );
    }

    Ok(json!({
        "format_version": FORMAT_VERSION,
        "name": graph.name(),
        "environment": {
            "account": target.account,
            "region": target.region,
        },
        "provisioning_order": order,
        "resources": resources,
        "parameters": parameters,
        "outputs": outputs,
    }))
}

/// Fingerprint a rendered template. Returns `"blake3:{hex}"`.
pub fn fingerprint(template: &serde_json::Value) -> String {
    let canonical = template.to_string();
    format!("blake3:{}", blake3::hash(canonical.as_bytes()).to_hex())
}

/// Write a template to disk atomically (temp file + rename).
pub fn write_template(path: &Path, template: &serde_json::Value) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create dir {}: {}", parent.display(), e))?;
        }
    }

    let pretty = serde_json::to_string_pretty(template)
        .map_err(|e| format!("serialize error: {}", e))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, format!("{}\n", pretty))
        .map_err(|e| format!("cannot write {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;

    Ok(())
}
