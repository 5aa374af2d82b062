pub mod scheme;
pub mod template;
pub mod user;

use std::path::{Path, PathBuf};

use crate::BuildRequest;

pub use scheme::{load_family, load_scheme, SchemeFamily, SchemeVariables};
pub use template::{load_template_config, OutputFile, TemplateConfig};
pub use user::{load_user_config, UserConfig};

pub const DEFAULT_SCHEMES_SOURCE: &str = "https://github.com/chriskempson/base16-schemes-source";
pub const DEFAULT_TEMPLATES_SOURCE: &str =
    "https://github.com/chriskempson/base16-templates-source";
pub const DEFAULT_JOBS: usize = 4;

/// Directory created under the resolved cache dir to hold every cached repository.
const CACHE_SUBDIR: &str = "base16-builder";

/// Fully resolved configuration for one pipeline run.
///
/// Built once at startup from the request, the user config file and the
/// environment, then passed down as a plain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub cache_root: PathBuf,
    pub schemes_source: String,
    pub templates_source: String,
    pub jobs: usize,
}

impl Settings {
    pub fn resolve(request: &BuildRequest, user: Option<&UserConfig>) -> Self {
        Self::resolve_with(
            request,
            user,
            |key| std::env::var(key).ok(),
            dirs::home_dir().as_deref(),
            &std::env::temp_dir(),
        )
    }

    /// Precedence for every field: request, then user config, then built-in default.
    pub fn resolve_with(
        request: &BuildRequest,
        user: Option<&UserConfig>,
        env: impl Fn(&str) -> Option<String>,
        home: Option<&Path>,
        temp_dir: &Path,
    ) -> Self {
        let cache_dir = request
            .cache_dir
            .clone()
            .or_else(|| user.and_then(|u| u.cache_dir.clone()))
            .unwrap_or_else(|| default_cache_dir(&env, home, temp_dir));

        let schemes_source = request
            .schemes_source
            .clone()
            .or_else(|| user.and_then(|u| u.schemes_source.clone()))
            .unwrap_or_else(|| DEFAULT_SCHEMES_SOURCE.to_string());

        let templates_source = request
            .templates_source
            .clone()
            .or_else(|| user.and_then(|u| u.templates_source.clone()))
            .unwrap_or_else(|| DEFAULT_TEMPLATES_SOURCE.to_string());

        let jobs = request
            .jobs
            .or_else(|| user.and_then(|u| u.jobs))
            .unwrap_or(DEFAULT_JOBS)
            .max(1);

        Self {
            cache_root: cache_dir.join(CACHE_SUBDIR),
            schemes_source,
            templates_source,
            jobs,
        }
    }
}

/// Whether `name` can be used as a single path component of the output tree.
///
/// Registry names and scheme slugs come from remote repositories and end up
/// in output paths, so separators and `..` are refused.
pub fn is_safe_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// First available of `$BASE16_BUILDER_CACHE_DIR`, `$XDG_CACHE_HOME`,
/// `$XDG_CACHE_DIR`, `$HOME/.cache`, or the platform temp dir.
pub fn default_cache_dir(
    env: impl Fn(&str) -> Option<String>,
    home: Option<&Path>,
    temp_dir: &Path,
) -> PathBuf {
    for key in ["BASE16_BUILDER_CACHE_DIR", "XDG_CACHE_HOME", "XDG_CACHE_DIR"] {
        if let Some(dir) = env(key).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
    }

    if let Some(home_cache) = home.map(|h| h.join(".cache")) {
        if home_cache.is_dir() {
            return home_cache;
        }
    }

    temp_dir.to_path_buf()
}
