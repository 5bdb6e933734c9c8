use std::path::PathBuf;

use super::load_config_text;

const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CliConfig {
    pub(crate) snapshot: Option<PathBuf>,
    pub(crate) debounce_ms: u64,
    pub(crate) load_error: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            snapshot: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            load_error: None,
        }
    }
}

pub(crate) fn load_cli_config() -> CliConfig {
    parse_cli_config(load_config_text().as_deref())
}

pub(crate) fn parse_cli_config(content: Option<&str>) -> CliConfig {
    let Some(content) = content else {
        return CliConfig::default();
    };
    let value: toml::Value = match toml::from_str(content) {
        Ok(value) => value,
        Err(_) => {
            return CliConfig {
                load_error: Some("Invalid quickfile.toml".to_string()),
                ..CliConfig::default()
            };
        }
    };
    let snapshot = value
        .get("host")
        .and_then(|host| host.get("snapshot"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(expand_home);
    let debounce_ms = value
        .get("search")
        .and_then(|search| search.get("debounce_ms"))
        .and_then(parse_millis)
        .unwrap_or(DEFAULT_DEBOUNCE_MS);
    CliConfig {
        snapshot,
        debounce_ms,
        load_error: None,
    }
}

fn parse_millis(value: &toml::Value) -> Option<u64> {
    value
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{CliConfig, parse_cli_config};

    #[test]
    fn missing_file_gives_defaults() {
        assert_eq!(parse_cli_config(None), CliConfig::default());
        assert_eq!(parse_cli_config(Some("")).debounce_ms, 200);
    }

    #[test]
    fn reads_host_and_search_tables() {
        let config = parse_cli_config(Some(
            "[host]\nsnapshot = \"/var/lib/quickfile/host.json\"\n\n[search]\ndebounce_ms = 50\n",
        ));
        assert_eq!(config.snapshot, Some(PathBuf::from("/var/lib/quickfile/host.json")));
        assert_eq!(config.debounce_ms, 50);
        assert!(config.load_error.is_none());
    }

    #[test]
    fn bad_values_fall_back_per_key() {
        let config = parse_cli_config(Some("[host]\nsnapshot = \"\"\n[search]\ndebounce_ms = -5\n"));
        assert_eq!(config.snapshot, None);
        assert_eq!(config.debounce_ms, 200);

        let config = parse_cli_config(Some("[search]\ndebounce_ms = \"0\"\n"));
        assert_eq!(config.debounce_ms, 0);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let config = parse_cli_config(Some("[host\nsnapshot = 1"));
        assert_eq!(config.load_error.as_deref(), Some("Invalid quickfile.toml"));
    }
}
