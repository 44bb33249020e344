use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::CalMcpConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["calmcp.toml", "calmcp.yaml", "calmcp.yml", "calmcp.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CalMcpConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./calmcp.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/calmcp/calmcp.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CalMcpConfig::default()` if no file is found or it fails to parse.
pub fn discover_and_load() -> CalMcpConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CalMcpConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            CalMcpConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply process environment variables on top of the loaded config.
///
/// Recognised: `ICLOUD_USERNAME`, `ICLOUD_APP_PASSWORD`, `CALDAV_PROVIDER`,
/// `CALDAV_URL`, `BIND`, `PORT`.
pub fn apply_env_overrides(config: &mut CalMcpConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_with(
    config: &mut CalMcpConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(username) = get("ICLOUD_USERNAME") {
        config.caldav.username = Some(username);
    }
    if let Some(password) = get("ICLOUD_APP_PASSWORD") {
        config.caldav.password = Some(Secret::new(password));
    }
    if let Some(provider) = get("CALDAV_PROVIDER") {
        config.caldav.provider = Some(provider);
    }
    if let Some(url) = get("CALDAV_URL") {
        config.caldav.url = Some(url);
    }
    if let Some(bind) = get("BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = get("PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid PORT"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/calmcp/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "calmcp").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CalMcpConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
