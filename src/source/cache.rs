use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BuilderError, Result};
use crate::source::RepoSync;

/// A source URL materialised in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRepository {
    pub source_url: String,
    pub local_path: PathBuf,
    /// True when this call cloned or advanced the working copy.
    pub fetched: bool,
}

/// Sidecar metadata stored next to every cached checkout as `<key>.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub url: String,
    /// Unix timestamp in seconds of the initial clone.
    pub cached_at: String,
    /// Unix timestamp in seconds of the last pull that advanced the checkout.
    pub updated_at: Option<String>,
}

/// A cache entry returned by `list_cached()`.
#[derive(Debug)]
pub struct CachedEntry {
    pub key: String,
    pub path: PathBuf,
    pub metadata: CacheMetadata,
}

/// Normalize a URL by stripping trailing `/` and `.git` for consistent comparison.
fn normalize_url(url: &str) -> &str {
    url.trim_end_matches('/').trim_end_matches(".git")
}

/// Derive the directory name for a source URL.
///
/// A readable repository-name prefix followed by 16 hex chars of the SHA-256
/// of the normalized URL, so distinct repositories sharing a name never collide.
pub fn cache_key(url: &str) -> String {
    let normalized = normalize_url(url);

    let digest = Sha256::digest(normalized.as_bytes());
    let hash: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();

    let prefix: String = normalized
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let prefix = if prefix.is_empty() { "repo" } else { &prefix };

    format!("{prefix}-{hash}")
}

/// What the first `ensure` of an entry did during this run.
#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Pending,
    Synced,
    Failed(String),
}

/// Clone-or-update cache of git working copies rooted at one directory.
///
/// Every URL maps to `root/<cache_key(url)>`. The first `ensure` of a URL on an
/// instance does the work. Later calls for the same URL replay its outcome:
/// the same path with `fetched = false`, or the same failure without another
/// clone. Calls for different URLs never block each other.
pub struct RepositoryCache {
    root: PathBuf,
    syncer: Arc<dyn RepoSync>,
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<SlotState>>>>,
}

impl RepositoryCache {
    pub fn new(root: impl Into<PathBuf>, syncer: Arc<dyn RepoSync>) -> Self {
        Self {
            root: root.into(),
            syncer,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.root.join(cache_key(url))
    }

    fn slot(&self, path: &Path) -> Arc<Mutex<SlotState>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(path.to_path_buf()).or_default())
    }

    /// Make sure `url` has a working copy under the cache root.
    ///
    /// Missing checkouts are cloned. Existing ones are pulled only when
    /// `update` is set, and report `fetched` only if the pull advanced them.
    pub fn ensure(&self, url: &str, update: bool) -> Result<CachedRepository> {
        let key = cache_key(url);
        let local_path = self.root.join(&key);

        let slot = self.slot(&local_path);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            SlotState::Pending => {}
            SlotState::Synced => {
                tracing::debug!(url, "already synced during this run");
                return Ok(CachedRepository {
                    source_url: url.to_string(),
                    local_path,
                    fetched: false,
                });
            }
            SlotState::Failed(reason) => {
                tracing::debug!(url, "sync already failed during this run");
                return Err(BuilderError::Sync {
                    url: url.to_string(),
                    reason: reason.clone(),
                });
            }
        }

        let result = self.sync_entry(url, &key, &local_path, update);
        *state = match &result {
            Ok(_) => SlotState::Synced,
            Err(BuilderError::Sync { reason, .. }) => SlotState::Failed(reason.clone()),
            Err(other) => SlotState::Failed(other.to_string()),
        };
        let fetched = result?;

        Ok(CachedRepository {
            source_url: url.to_string(),
            local_path,
            fetched,
        })
    }

    /// Clone or pull one entry under its file lock. Returns whether it moved.
    fn sync_entry(&self, url: &str, key: &str, local_path: &Path, update: bool) -> Result<bool> {
        std::fs::create_dir_all(&self.root).map_err(|e| BuilderError::Io {
            context: format!("creating cache directory {}", self.root.display()),
            source: e,
        })?;
        let _lock = lock_entry(&self.root, key)?;

        if local_path.join(".git").is_dir() {
            if !update {
                tracing::debug!(url, path = %local_path.display(), "cache hit");
                return Ok(false);
            }
            tracing::info!(url, path = %local_path.display(), "pulling");
            let advanced = self.syncer.pull(url, local_path)?;
            if advanced {
                touch_metadata(&self.root, key, url)?;
            }
            return Ok(advanced);
        }

        tracing::info!(url, path = %local_path.display(), "cloning");
        self.clone_into_place(url, local_path)?;
        write_metadata(
            &self.root,
            key,
            &CacheMetadata {
                url: url.to_string(),
                cached_at: unix_timestamp_secs(),
                updated_at: None,
            },
        )?;
        Ok(true)
    }

    /// Clone into a staging directory inside the cache root, then move it into
    /// place so an interrupted clone never leaves a half-populated entry.
    fn clone_into_place(&self, url: &str, local_path: &Path) -> Result<()> {
        let staging = tempfile::Builder::new()
            .prefix(".clone-")
            .tempdir_in(&self.root)
            .map_err(|e| BuilderError::Io {
                context: "creating staging directory for git clone".into(),
                source: e,
            })?;

        self.syncer.clone_repo(url, staging.path())?;

        // Anything already at the path is not a checkout (no .git) and is stale.
        if local_path.exists() {
            std::fs::remove_dir_all(local_path).map_err(|e| BuilderError::Io {
                context: format!("removing stale cache entry {}", local_path.display()),
                source: e,
            })?;
        }

        std::fs::rename(staging.path(), local_path).map_err(|e| BuilderError::Io {
            context: format!("moving clone into {}", local_path.display()),
            source: e,
        })?;

        // The staging path no longer exists after the rename.
        let _ = staging.keep();
        Ok(())
    }
}

/// Exclusive advisory lock on `<root>/<key>.lock`, released when the file drops.
fn lock_entry(root: &Path, key: &str) -> Result<File> {
    let lock_path = root.join(format!("{key}.lock"));
    let file = File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| BuilderError::Io {
            context: format!("opening lock file {}", lock_path.display()),
            source: e,
        })?;
    file.lock_exclusive().map_err(|e| BuilderError::Io {
        context: format!("locking {}", lock_path.display()),
        source: e,
    })?;
    Ok(file)
}

fn metadata_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{key}.toml"))
}

fn write_metadata(root: &Path, key: &str, metadata: &CacheMetadata) -> Result<()> {
    let metadata_toml =
        toml::to_string_pretty(metadata).map_err(|e| BuilderError::CacheMetadata {
            context: format!("serializing cache metadata: {e}"),
        })?;
    let path = metadata_path(root, key);
    std::fs::write(&path, metadata_toml).map_err(|e| BuilderError::Io {
        context: format!("writing cache metadata {}", path.display()),
        source: e,
    })
}

fn read_metadata(path: &Path) -> Result<CacheMetadata> {
    let content = std::fs::read_to_string(path).map_err(|e| BuilderError::Io {
        context: format!("reading cache metadata {}", path.display()),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| BuilderError::CacheMetadata {
        context: format!("parsing cache metadata {}: {e}", path.display()),
    })
}

fn touch_metadata(root: &Path, key: &str, url: &str) -> Result<()> {
    let path = metadata_path(root, key);
    let now = unix_timestamp_secs();
    let metadata = match read_metadata(&path) {
        Ok(existing) => CacheMetadata {
            updated_at: Some(now),
            ..existing
        },
        Err(_) => CacheMetadata {
            url: url.to_string(),
            cached_at: now.clone(),
            updated_at: Some(now),
        },
    };
    write_metadata(root, key, &metadata)
}

/// List every repository in the cache rooted at `root`.
pub fn list_cached(root: &Path) -> Result<Vec<CachedEntry>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let read_dir = std::fs::read_dir(root).map_err(|e| BuilderError::Io {
        context: format!("reading cache directory {}", root.display()),
        source: e,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| BuilderError::Io {
            context: "reading cache directory entry".into(),
            source: e,
        })?;

        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let key = entry.file_name().to_string_lossy().into_owned();
        let metadata_path = metadata_path(root, &key);
        if !metadata_path.exists() {
            continue;
        }

        let metadata = read_metadata(&metadata_path)?;
        entries.push(CachedEntry {
            key,
            path,
            metadata,
        });
    }

    entries.sort_by(|a, b| a.metadata.url.cmp(&b.metadata.url));
    Ok(entries)
}

/// Clear cached repositories.
///
/// If `url` is provided, only the entry for that URL is removed.
/// If `url` is None, the entire cache root is removed.
pub fn clear_cache(root: &Path, url: Option<&str>) -> Result<()> {
    let Some(url) = url else {
        if root.exists() {
            std::fs::remove_dir_all(root).map_err(|e| BuilderError::Io {
                context: format!("removing cache directory {}", root.display()),
                source: e,
            })?;
        }
        return Ok(());
    };

    let key = cache_key(url);
    let checkout = root.join(&key);
    if checkout.exists() {
        std::fs::remove_dir_all(&checkout).map_err(|e| BuilderError::Io {
            context: format!("removing cached repository {}", checkout.display()),
            source: e,
        })?;
    }
    for sidecar in [metadata_path(root, &key), root.join(format!("{key}.lock"))] {
        if sidecar.exists() {
            std::fs::remove_file(&sidecar).map_err(|e| BuilderError::Io {
                context: format!("removing {}", sidecar.display()),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn unix_timestamp_secs() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}
