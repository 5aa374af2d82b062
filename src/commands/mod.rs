pub mod build;
pub mod cache;
pub mod list;
pub mod update;

use base16_builder::config::{load_user_config, Settings};
use base16_builder::BuildRequest;
use miette::Result;

use crate::cli::SourceArgs;

/// Fold the source flags into `request` and resolve it against the user config.
fn resolve_settings(request: &mut BuildRequest, source: SourceArgs) -> Result<Settings> {
    request.cache_dir = source.cache_dir;
    request.schemes_source = source.schemes_source;
    request.templates_source = source.templates_source;
    request.jobs = source.jobs;

    let user = load_user_config()?;
    Ok(Settings::resolve(request, user.as_ref()))
}
