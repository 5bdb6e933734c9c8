use std::time::Duration;

use anyhow::{Result, anyhow};
use quickfile_core::prefs::{DEFAULT_FOLDERS, EXCLUDED_FOLDERS};
use quickfile_core::recent::load_recent;
use quickfile_core::search::search;
use quickfile_core::selection::load_validated;
use quickfile_core::{
    BuildOptions, ExactMatch, FolderItem, FolderRef, FolderTree, MailHost, MemoryHost, NodeId,
    NodeKind, NodeRef, OpenRequest, Operation, PickerSession, Preferences, RecencyMetric,
    SearchResults,
};
use serde_json::{Value as JsonValue, json};

use super::{
    Cli, CliCommand, CliConfig, PickCmd, PrefsCommand, RecentCmd, SearchCmd, SelectionCommand,
    load_snapshot, node_json, output_ok, parse_folder_ref, parse_operations, parse_pref_value,
    resolve_snapshot_path, save_snapshot,
};

pub(crate) fn run_cli(rt: &tokio::runtime::Runtime, cli: Cli, config: &CliConfig) -> Result<()> {
    if let Some(err) = config.load_error.as_deref() {
        return Err(anyhow!("{}", err));
    }
    let path = resolve_snapshot_path(
        cli.snapshot,
        std::env::var_os("QUICKFILE_SNAPSHOT"),
        config,
    )?;
    let original = load_snapshot(&path)?;
    let host = MemoryHost::new(original.clone());
    let result = rt.block_on(dispatch(&host, cli.command, config))?;
    let updated = host.snapshot()?;
    if updated != original {
        save_snapshot(&path, &updated)?;
        log::debug!("snapshot {} updated", path.display());
    }
    output_ok(result)
}

pub(crate) async fn dispatch(
    host: &MemoryHost,
    command: CliCommand,
    config: &CliConfig,
) -> Result<JsonValue> {
    match command {
        CliCommand::Accounts => {
            let accounts = host.list_accounts().await?;
            let out: Vec<JsonValue> = accounts
                .iter()
                .map(|account| {
                    json!({
                        "id": account.id,
                        "name": account.name,
                        "type": account.account_type.as_str(),
                        "folders": count_folders(&account.folders),
                    })
                })
                .collect();
            Ok(json!(out))
        }
        CliCommand::Tree(cmd) => {
            let prefs = Preferences::load(host).await;
            let tree = build_tree(host, cmd.skip_archive.unwrap_or(prefs.skip_archive)).await?;
            Ok(tree_node_json(tree.root()))
        }
        CliCommand::Recent(cmd) => recent(host, config, cmd).await,
        CliCommand::Search(cmd) => run_search(host, config, cmd).await,
        CliCommand::Pick(cmd) => pick(host, config, cmd).await,
        CliCommand::Defaults(cmd) => selection(host, config, DEFAULT_FOLDERS, cmd.command).await,
        CliCommand::Excluded(cmd) => selection(host, config, EXCLUDED_FOLDERS, cmd.command).await,
        CliCommand::Prefs(cmd) => match cmd.command {
            PrefsCommand::Get { key } => {
                let prefs = Preferences::load(host).await;
                match key {
                    Some(key) => {
                        let value = prefs.get(&key)?;
                        Ok(single_entry(key, value))
                    }
                    None => Ok(serde_json::to_value(&prefs)?),
                }
            }
            PrefsCommand::Set { key, value } => {
                Preferences::store(host, &key, parse_pref_value(&value)).await?;
                let value = Preferences::load(host).await.get(&key)?;
                Ok(single_entry(key, value))
            }
        },
    }
}

fn single_entry(key: String, value: JsonValue) -> JsonValue {
    let mut map = serde_json::Map::new();
    map.insert(key, value);
    JsonValue::Object(map)
}

fn count_folders(folders: &[FolderItem]) -> usize {
    folders
        .iter()
        .map(|folder| 1 + count_folders(&folder.sub_folders))
        .sum()
}

async fn build_tree(host: &MemoryHost, skip_archive: bool) -> Result<FolderTree> {
    let accounts = host.list_accounts().await?;
    let tags = host.list_tags().await?;
    let unified = host.list_unified_folders().await?;
    Ok(FolderTree::build(
        accounts,
        BuildOptions {
            skip_archive,
            tag_folders: (!tags.is_empty()).then(|| tags.iter().map(|tag| tag.to_folder()).collect()),
            unified_folders: (!unified.is_empty()).then_some(unified),
        },
    ))
}

fn tree_node_json(node: NodeRef<'_>) -> JsonValue {
    let kind = match node.kind() {
        NodeKind::Root => "root",
        NodeKind::Account(_) => "account",
        NodeKind::Folder(_) => "folder",
        NodeKind::VirtualFolder(_) => "virtualFolder",
    };
    let children: Vec<JsonValue> = node.children().map(tree_node_json).collect();
    json!({
        "kind": kind,
        "name": node.name(),
        "accountId": node.account_id(),
        "path": node.path(),
        "type": node.type_label(),
        "fileable": node.can_file_messages(),
        "children": children,
    })
}

fn open_request(config: &CliConfig, operation: Operation, current: Option<FolderRef>) -> OpenRequest {
    OpenRequest {
        operation,
        current_folder: current,
        debounce: Duration::from_millis(config.debounce_ms),
        ..OpenRequest::default()
    }
}

fn entries_json(session: &PickerSession<'_>, nodes: &[NodeId]) -> Vec<JsonValue> {
    let show_path = session.preferences().show_folder_path;
    session
        .labels(nodes)
        .iter()
        .zip(nodes)
        .map(|(label, &id)| node_json(session.tree(), id, label, show_path))
        .collect()
}

async fn recent(host: &MemoryHost, config: &CliConfig, cmd: RecentCmd) -> Result<JsonValue> {
    let session = PickerSession::open(host, host, open_request(config, Operation::Goto, None)).await?;
    let mut options = session.preferences().recent_options();
    if let Some(limit) = cmd.limit {
        options.max_recent = limit;
    }
    if let Some(metric) = cmd.metric.as_deref() {
        options.metric = match metric {
            "accessed" => RecencyMetric::Accessed,
            "modified" => RecencyMetric::Modified,
            other => return Err(anyhow!("unknown metric: {}", other)),
        };
    }
    let folders = load_recent(host, session.tree().accounts(), &options).await;
    let nodes: Vec<NodeId> = folders
        .iter()
        .filter_map(|folder| session.tree().find(&folder.folder_ref()))
        .collect();
    let mut entries = entries_json(&session, &nodes);
    for (entry, &id) in entries.iter_mut().zip(&nodes) {
        if let Some(item) = session.tree().node(id).item() {
            entry["metric"] = json!(item.metric(options.metric));
        }
    }
    Ok(json!(entries))
}

async fn run_search(host: &MemoryHost, config: &CliConfig, cmd: SearchCmd) -> Result<JsonValue> {
    let operation: Operation = cmd.op.parse()?;
    let current = cmd.current.as_deref().map(parse_folder_ref).transpose()?;
    let session = PickerSession::open(host, host, open_request(config, operation, current)).await?;

    let mut options = session.preferences().search_options();
    if cmd.full_path {
        options.partial_match_full_path = true;
    }
    if cmd.all_exact {
        options.exact_match = ExactMatch::All;
    }
    let query = cmd.query.join(" ");
    let (state, nodes) = match search(session.tree(), session.candidates(), &query, &options) {
        SearchResults::Blank => ("default", session.default_items()),
        SearchResults::NoResults => ("noResults", Vec::new()),
        SearchResults::Matches(nodes) => ("results", nodes),
    };
    Ok(json!({
        "query": query,
        "state": state,
        "entries": entries_json(&session, &nodes),
    }))
}

/// `--message` ids stand in for the host selection only while the pick runs.
async fn pick(host: &MemoryHost, config: &CliConfig, cmd: PickCmd) -> Result<JsonValue> {
    if cmd.messages.is_empty() {
        return run_pick(host, config, cmd).await;
    }
    let previous = host.selected_messages().await?;
    host.set_selected_messages(cmd.messages.clone())?;
    let result = run_pick(host, config, cmd).await;
    host.set_selected_messages(previous)?;
    result
}

async fn run_pick(host: &MemoryHost, config: &CliConfig, cmd: PickCmd) -> Result<JsonValue> {
    let operation: Operation = cmd.op.parse()?;
    let current = cmd.current.as_deref().map(parse_folder_ref).transpose()?;
    let mut request = open_request(config, operation, current);
    request.allowed = parse_operations(&cmd.allowed)?;
    let mut session = PickerSession::open(host, host, request).await?;

    if let Some(query) = cmd.query {
        session.input(query);
    }
    let selected = match cmd.select.as_deref() {
        Some(raw) => {
            let folder = parse_folder_ref(raw)?;
            let node = session
                .tree()
                .find(&folder)
                .ok_or_else(|| anyhow!("Folder not found: {}", folder))?;
            Some(node)
        }
        None => None,
    };
    let outcome = session.commit(selected).await?;
    session.close();
    Ok(json!({
        "operation": operation,
        "query": session.query(),
        "outcome": outcome,
    }))
}

async fn selection(
    host: &MemoryHost,
    config: &CliConfig,
    key: &str,
    command: SelectionCommand,
) -> Result<JsonValue> {
    if let SelectionCommand::Validate = command {
        let prefs = Preferences::load(host).await;
        let tree = build_tree(host, prefs.skip_archive).await?;
        let validated = load_validated(host, key, &tree).await;
        return Ok(json!({
            "kept": validated.selection.to_persisted(),
            "missing": validated.missing,
        }));
    }

    let mut session = PickerSession::open(host, host, open_request(config, Operation::Goto, None)).await?;
    let defaults = key == DEFAULT_FOLDERS;
    let changed = match command {
        SelectionCommand::Add { folder } => {
            let node = find_node(&session, &folder)?;
            if defaults {
                session.add_default(node).await
            } else {
                session.add_excluded(node).await
            }
        }
        SelectionCommand::Remove { folder } => {
            let node = find_node(&session, &folder)?;
            if defaults {
                session.remove_default(node).await
            } else {
                session.remove_excluded(node).await
            }
        }
        SelectionCommand::List | SelectionCommand::Validate => false,
    };

    let current = if defaults {
        session.defaults()
    } else {
        session.excluded()
    };
    let nodes = current.nodes(session.tree());
    Ok(json!({
        "changed": changed,
        "folders": entries_json(&session, &nodes),
    }))
}

fn find_node(session: &PickerSession<'_>, raw: &str) -> Result<NodeId> {
    let folder = parse_folder_ref(raw)?;
    session
        .tree()
        .find(&folder)
        .ok_or_else(|| anyhow!("Folder not found: {}", folder))
}
