pub mod cache;
pub mod git;

use std::path::Path;

use crate::error::Result;

pub use cache::{
    cache_key, clear_cache, list_cached, CacheMetadata, CachedEntry, CachedRepository,
    RepositoryCache,
};
pub use git::SystemGit;

/// The version-control primitive the cache is built on.
///
/// Implementations report failures as [`BuilderError::Sync`](crate::error::BuilderError::Sync)
/// and must be safe to call from several threads for distinct destinations.
pub trait RepoSync: Send + Sync {
    /// Clone `url` into `dest`, which does not exist or is an empty directory.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fast-forward the checkout at `dest`. Returns whether the working tree advanced.
    fn pull(&self, url: &str, dest: &Path) -> Result<bool>;
}
