use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuilderError, Result};

/// Defaults from `~/.config/base16-builder/config.toml`. Request fields win
/// over these, and these win over the built-in defaults.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub cache_dir: Option<PathBuf>,
    pub schemes_source: Option<String>,
    pub templates_source: Option<String>,
    /// Number of repositories synced concurrently.
    pub jobs: Option<usize>,
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("base16-builder").join("config.toml"))
}

/// Load the user config, if there is one. A file that exists but does not
/// parse is an error, so a typo never silently falls back to defaults.
pub fn load_user_config() -> Result<Option<UserConfig>> {
    match user_config_path() {
        Some(path) => read_user_config(&path),
        None => Ok(None),
    }
}

fn read_user_config(path: &Path) -> Result<Option<UserConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(BuilderError::Io {
                context: format!("reading user config {}", path.display()),
                source: e,
            })
        }
    };

    let config = toml::from_str(&content).map_err(|e| BuilderError::UserConfigParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "loaded user config");
    Ok(Some(config))
}
