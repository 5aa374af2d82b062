use std::sync::Arc;

use base16_builder::registry::{self, Kind};
use base16_builder::source::{RepositoryCache, SystemGit};
use base16_builder::BuildRequest;
use console::style;
use miette::Result;

use crate::cli::{ListKind, SourceArgs};

pub fn run(kind: ListKind, source: SourceArgs) -> Result<()> {
    let mut request = BuildRequest::default();
    let settings = super::resolve_settings(&mut request, source)?;
    let cache = RepositoryCache::new(&settings.cache_root, Arc::new(SystemGit::new()));

    let (kind, url) = match kind {
        ListKind::Schemes => (Kind::Scheme, &settings.schemes_source),
        ListKind::Templates => (Kind::Template, &settings.templates_source),
    };
    let registry = registry::resolve(&cache, url, kind, false)?;

    println!(
        "{} ({} {}{})\n",
        style(url).bold(),
        registry.entries.len(),
        kind,
        if registry.entries.len() == 1 { "" } else { "s" }
    );
    for entry in &registry.entries {
        println!("  {} {}", entry.name, style(&entry.source_url).dim());
    }

    Ok(())
}
