use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::SkylarkConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["skylark.toml", "skylark.yaml", "skylark.yml", "skylark.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SkylarkConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Serialize `config` and replace the file at `path` wholesale.
///
/// The document is always written in full, never patched in place. Creates
/// parent directories if needed.
pub fn write_config_file(path: &Path, config: &SkylarkConfig) -> Result<(), LoadError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LoadError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let serialized = serialize_config(config, path)?;
    std::fs::write(path, serialized).map_err(|source| LoadError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote config");
    Ok(())
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skylark.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/skylark/skylark.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkylarkConfig::default()` if no config file is found or the
/// file fails to parse.
#[must_use]
pub fn discover_and_load() -> SkylarkConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SkylarkConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/skylark/`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skylark").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
#[must_use]
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skylark.toml")
}

fn parse_config(raw: &str, path: &Path) -> Result<SkylarkConfig, LoadError> {
    let map_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match extension(path) {
        "toml" => toml::from_str(raw).map_err(|e| map_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| map_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| map_err(e.to_string())),
        other => Err(map_err(format!("unsupported config format: .{other}"))),
    }
}

fn serialize_config(config: &SkylarkConfig, path: &Path) -> Result<String, LoadError> {
    let map_err = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match extension(path) {
        "toml" => toml::to_string_pretty(config).map_err(|e| map_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::to_string(config).map_err(|e| map_err(e.to_string())),
        "json" => serde_json::to_string_pretty(config)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| map_err(e.to_string())),
        other => Err(map_err(format!("unsupported config format: .{other}"))),
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

/// Errors from loading or persisting the config document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}
