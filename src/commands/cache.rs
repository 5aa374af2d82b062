use std::path::PathBuf;

use base16_builder::config::Settings;
use base16_builder::source::{clear_cache, list_cached, CachedEntry};
use base16_builder::BuildRequest;
use console::style;
use miette::Result;

use crate::cli::{CacheAction, SourceArgs};

pub fn run(action: CacheAction, cache_dir: Option<PathBuf>) -> Result<()> {
    let mut request = BuildRequest::default();
    let source = SourceArgs {
        cache_dir,
        schemes_source: None,
        templates_source: None,
        jobs: None,
    };
    let Settings { cache_root, .. } = super::resolve_settings(&mut request, source)?;

    match action {
        CacheAction::List => list(&cache_root),
        CacheAction::Clear { url } => {
            clear_cache(&cache_root, url.as_deref())?;
            match url {
                Some(url) => println!("{} Removed {}", style("✓").green().bold(), url),
                None => println!(
                    "{} Cleared {}",
                    style("✓").green().bold(),
                    style(cache_root.display()).cyan()
                ),
            }
            Ok(())
        }
    }
}

fn list(cache_root: &std::path::Path) -> Result<()> {
    let entries = list_cached(cache_root)?;

    if entries.is_empty() {
        println!(
            "No cached repositories. Run '{}' to populate the cache.",
            style("base16-builder update").cyan()
        );
        return Ok(());
    }

    println!(
        "{} ({} repositor{})\n",
        style("Cached repositories").bold(),
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    );

    for entry in &entries {
        print_entry(entry);
    }

    Ok(())
}

fn print_entry(entry: &CachedEntry) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    println!("  {}  {}", style("source:").dim(), entry.metadata.url);
    println!("  {}    {}", style("path:").dim(), entry.path.display());
    println!(
        "  {}  {}",
        style("cached:").dim(),
        age(&entry.metadata.cached_at, now)
    );
    if let Some(updated) = &entry.metadata.updated_at {
        println!("  {} {}", style("updated:").dim(), age(updated, now));
    }
    println!();
}

const AGE_UNITS: [(u64, &str); 3] = [(86_400, "day"), (3_600, "hour"), (60, "minute")];

/// Render a stored unix timestamp relative to `now`. Anything that is not a
/// timestamp is shown as stored.
fn age(stamp: &str, now: u64) -> String {
    let Ok(then) = stamp.parse::<u64>() else {
        return stamp.to_string();
    };
    let elapsed = now.saturating_sub(then);
    match AGE_UNITS.iter().find(|(size, _)| elapsed >= *size) {
        Some((size, unit)) => {
            let count = elapsed / size;
            let plural = if count == 1 { "" } else { "s" };
            format!("{count} {unit}{plural} ago")
        }
        None => "just now".to_string(),
    }
}
