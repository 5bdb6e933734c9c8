use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use quickfile_core::label::{parent_hint, pretty_path};
use quickfile_core::{FolderRef, FolderTree, NodeId, Operation};
use serde_json::{Value as JsonValue, json};

use super::{CLI_SCHEMA_VERSION, CliConfig};

pub(crate) fn output_ok(value: JsonValue) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": true,
            "result": value
        }))?
    );
    Ok(())
}

pub(crate) fn output_error(message: &str) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({
            "schema": CLI_SCHEMA_VERSION,
            "ok": false,
            "error": message
        }))?
    );
    Ok(())
}

/// `--snapshot` wins over `QUICKFILE_SNAPSHOT`, which wins over the config file.
pub(crate) fn resolve_snapshot_path(
    flag: Option<PathBuf>,
    env: Option<OsString>,
    config: &CliConfig,
) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(raw) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(raw));
    }
    config.snapshot.clone().ok_or_else(|| {
        anyhow!("No snapshot configured (use --snapshot, QUICKFILE_SNAPSHOT or [host].snapshot)")
    })
}

pub(crate) fn parse_folder_ref(raw: &str) -> Result<FolderRef> {
    FolderRef::parse(raw).ok_or_else(|| anyhow!("Expected account://path, got {:?}", raw))
}

/// Accepts repeated flags as well as comma-separated lists.
pub(crate) fn parse_operations(raw: &[String]) -> Result<Vec<Operation>> {
    raw.iter()
        .flat_map(|item| item.split(','))
        .filter(|item| !item.trim().is_empty())
        .map(|item| item.parse::<Operation>())
        .collect()
}

/// JSON when it parses, a plain string otherwise.
pub(crate) fn parse_pref_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

pub(crate) fn node_json(tree: &FolderTree, id: NodeId, label: &str, show_path: bool) -> JsonValue {
    let node = tree.node(id);
    let mut value = json!({
        "accountId": node.account_id(),
        "path": node.path(),
        "name": node.name(),
        "label": label,
        "type": node.type_label(),
        "fileable": node.can_file_messages(),
        "prettyPath": pretty_path(node),
    });
    if show_path {
        value["parentHint"] = json!(parent_hint(node));
    }
    value
}
