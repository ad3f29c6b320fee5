use northbase_core::config::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use serde::Deserialize;
use tracing::{info, error};

/// Optional `config.yaml` inside the config directory.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StaticConfig {
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    debug: Option<bool>,
}

fn default_config_dir() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("failed to resolve the home directory")?;
    Ok(home.join(".northbase"))
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        let v = v.trim().to_ascii_lowercase();
        !(v.is_empty() || v == "0" || v == "false" || v == "no")
    })
}

/// Resolve the config directory without reading anything inside it.
///
/// `--config-dir` wins over `NORTHBASE_HOME`, which wins over `~/.northbase`.
pub fn resolve_config_dir(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    match std::env::var("NORTHBASE_HOME") {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => default_config_dir(),
    }
}

/// Build the settings for one invocation from the config directory, its
/// optional `config.yaml`, and environment overrides.
pub fn load_config(config_dir: Option<&Path>, debug_flag: bool) -> Result<Settings> {
    let config_dir = resolve_config_dir(config_dir)?;
    let mut settings = Settings::new(&config_dir);

    let yaml_path = config_dir.join("config.yaml");
    if yaml_path.exists() {
        let content = fs::read_to_string(&yaml_path).map_err(|e| {
            error!(error = ?e, config_path = ?yaml_path, "Failed to read config file");
            anyhow::anyhow!("Failed to read config file {:?}: {}", yaml_path, e)
        })?;
        // An empty file parses as null.
        let static_conf: StaticConfig = if content.trim().is_empty() {
            StaticConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|e| {
                error!(error = ?e, config_path = ?yaml_path, "Failed to parse config YAML");
                anyhow::anyhow!("Failed to parse config YAML {:?}: {e}", yaml_path)
            })?
        };
        info!(config_path = ?yaml_path, "Parsed config YAML successfully");
        if let Some(concurrency) = static_conf.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(debug) = static_conf.debug {
            settings.debug = debug;
        }
    }

    if let Ok(raw) = std::env::var("NORTHBASE_CONCURRENCY") {
        settings.concurrency = raw.trim().parse::<usize>().map_err(|e| {
            error!(error = ?e, var = ?raw, "NORTHBASE_CONCURRENCY must be a positive integer");
            anyhow::anyhow!("NORTHBASE_CONCURRENCY must be a positive integer: {e}")
        })?;
    }
    if let Some(debug) = env_flag("NORTHBASE_DEBUG") {
        settings.debug = debug;
    }
    if debug_flag {
        settings.debug = true;
    }

    if settings.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }

    settings.trace_loaded();
    Ok(settings)
}
