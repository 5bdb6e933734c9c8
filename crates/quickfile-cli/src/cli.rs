use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::{CLI_SCHEMA_VERSION, load_config_text, load_snapshot, save_snapshot};

#[path = "cli_command_handlers.rs"]
mod cli_command_handlers;
#[path = "cli_config.rs"]
mod cli_config;
#[path = "cli_runtime_helpers.rs"]
mod cli_runtime_helpers;
pub(crate) use cli_command_handlers::run_cli;
pub(crate) use cli_config::{CliConfig, load_cli_config};
pub(crate) use cli_runtime_helpers::{
    node_json, output_error, output_ok, parse_folder_ref, parse_operations, parse_pref_value,
    resolve_snapshot_path,
};

#[derive(Parser, Debug)]
#[command(name = "quickfile", version, about = "Quick folder and tag picker for mail")]
pub(crate) struct Cli {
    /// Host snapshot to read and update.
    #[arg(long, global = true)]
    pub(crate) snapshot: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// List accounts in host order.
    Accounts,
    Tree(TreeCmd),
    Recent(RecentCmd),
    Search(SearchCmd),
    /// Run a move, copy, goto or tag through the picker.
    Pick(PickCmd),
    Defaults(SelectionCmd),
    Excluded(SelectionCmd),
    Prefs(PrefsCmd),
}

#[derive(Args, Debug)]
pub(crate) struct TreeCmd {
    #[arg(long = "skip-archive")]
    pub(crate) skip_archive: Option<bool>,
}

#[derive(Args, Debug)]
pub(crate) struct RecentCmd {
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    #[arg(long)]
    pub(crate) metric: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct SearchCmd {
    #[arg(required = true, num_args = 1..)]
    pub(crate) query: Vec<String>,
    #[arg(long, default_value = "move")]
    pub(crate) op: String,
    #[arg(long)]
    pub(crate) current: Option<String>,
    #[arg(long = "full-path")]
    pub(crate) full_path: bool,
    #[arg(long = "all-exact")]
    pub(crate) all_exact: bool,
}

#[derive(Args, Debug)]
pub(crate) struct PickCmd {
    #[arg(long, default_value = "move")]
    pub(crate) op: String,
    #[arg(long)]
    pub(crate) query: Option<String>,
    /// Folder to pick, as `account://path`. Defaults to the first entry.
    #[arg(long)]
    pub(crate) select: Option<String>,
    #[arg(long)]
    pub(crate) current: Option<String>,
    #[arg(long = "allow")]
    pub(crate) allowed: Vec<String>,
    /// Message ids to act on instead of the host selection.
    #[arg(long = "message")]
    pub(crate) messages: Vec<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct SelectionCmd {
    #[command(subcommand)]
    pub(crate) command: SelectionCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum SelectionCommand {
    List,
    Add { folder: String },
    Remove { folder: String },
    /// Drop entries whose folders no longer exist.
    Validate,
}

#[derive(Args, Debug)]
pub(crate) struct PrefsCmd {
    #[command(subcommand)]
    pub(crate) command: PrefsCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum PrefsCommand {
    Get { key: Option<String> },
    Set { key: String, value: String },
}
