use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use quickfile_core::HostSnapshot;

mod cli;

use cli::{Cli, load_cli_config, output_error, run_cli};

const CLI_SCHEMA_VERSION: &str = "quickfile.cli.v1";

fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("quickfile.toml"),
        xdg_config_dir().join("quickfile").join("quickfile.toml"),
    ]
}

fn load_config_text() -> Option<String> {
    for path in config_path_candidates() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            return Some(content);
        }
    }
    None
}

fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    // Keep ownership and permissions of an existing file.
    if path.exists() {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        return Ok(());
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn load_snapshot(path: &Path) -> Result<HostSnapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", path.display()))
}

fn save_snapshot(path: &Path, snapshot: &HostSnapshot) -> Result<()> {
    let mut text = serde_json::to_string_pretty(snapshot)?;
    text.push('\n');
    write_text_atomic(path, &text)
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::new().filter_or("QUICKFILE_LOG", "warn"))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_cli_config();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    if let Err(err) = run_cli(&rt, cli, &config) {
        return output_error(&format!("{:#}", err));
    }
    Ok(())
}
