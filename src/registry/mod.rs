use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::is_safe_name;
use crate::error::{BuilderError, Result};
use crate::source::{CachedRepository, RepositoryCache};

const LIST_STEM: &str = "list";

/// Which kind of entity a registry lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Scheme,
    Template,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Scheme => f.write_str("scheme"),
            Kind::Template => f.write_str("template"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub source_url: String,
    pub kind: Kind,
}

/// The decoded name→URL mapping of one registry, sorted by name.
#[derive(Debug, Clone)]
pub struct Registry {
    pub kind: Kind,
    pub entries: Vec<RegistryEntry>,
    /// The cached registry checkout itself.
    pub repository: CachedRepository,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

/// Sync the registry repository at `registry_url` and decode its `list.yaml`.
pub fn resolve(
    cache: &RepositoryCache,
    registry_url: &str,
    kind: Kind,
    update: bool,
) -> Result<Registry> {
    let repository = cache
        .ensure(registry_url, update)
        .map_err(|e| BuilderError::RegistrySync {
            kind,
            url: registry_url.to_string(),
            reason: e.to_string(),
        })?;

    let entries = read_list(&repository.local_path, kind)?;
    tracing::debug!(%kind, url = registry_url, count = entries.len(), "resolved registry");

    Ok(Registry {
        kind,
        entries,
        repository,
    })
}

fn find_list(repo_dir: &Path) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| repo_dir.join(format!("{LIST_STEM}.{ext}")))
        .find(|p| p.is_file())
}

/// Decode the `list.yaml` of a registry checkout into entries sorted by name.
pub fn read_list(repo_dir: &Path, kind: Kind) -> Result<Vec<RegistryEntry>> {
    let Some(path) = find_list(repo_dir) else {
        return Err(BuilderError::RegistryDecode {
            kind,
            path: repo_dir.join(format!("{LIST_STEM}.yaml")),
            reason: "list file not found".into(),
        });
    };

    let content = std::fs::read_to_string(&path).map_err(|e| BuilderError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })?;

    let list: BTreeMap<String, String> =
        serde_yaml::from_str(&content).map_err(|e| BuilderError::RegistryDecode {
            kind,
            path: path.clone(),
            reason: e.to_string(),
        })?;

    if let Some(name) = list.keys().find(|name| !is_safe_name(name)) {
        return Err(BuilderError::RegistryDecode {
            kind,
            path,
            reason: format!("entry '{name}' is not a plain name"),
        });
    }

    if let Some((name, _)) = list.iter().find(|(_, url)| url.trim().is_empty()) {
        return Err(BuilderError::RegistryDecode {
            kind,
            path,
            reason: format!("entry '{name}' has an empty source URL"),
        });
    }

    Ok(list
        .into_iter()
        .map(|(name, source_url)| RegistryEntry {
            name,
            source_url,
            kind,
        })
        .collect())
}
