//! The build orchestrator: resolve both registries, plan the selection, sync
//! every selected repository, then render each (scheme, template) pair.
//!
//! A scheme registry entry names a family repository. Every scheme file in it
//! is rendered as its own scheme, keyed by the file's slug.
//!
//! Registry and selection failures are fatal and returned as `Err`. Anything
//! that goes wrong for a single repository or pair is recorded in
//! [`PipelineOutcome::errors`] and the run carries on with the rest.

pub mod outcome;
pub mod pool;

use std::collections::BTreeMap;

use crate::config::{load_family, SchemeVariables};
use crate::error::{BuilderError, Result};
use crate::plan::{plan, Selection};
use crate::registry::{self, Kind, Registry};
use crate::render::LoadedTemplate;
use crate::source::{CachedRepository, RepositoryCache};

pub use outcome::{PipelineError, PipelineOutcome, RenderResult, TemplateOutputs};
pub use pool::{run_bounded, CancellationToken};

/// Inputs of one pipeline run. The cache root lives on the [`RepositoryCache`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub scheme: Option<String>,
    pub template: Option<String>,
    pub schemes_source: String,
    pub templates_source: String,
    /// Pull repositories that are already cached.
    pub update: bool,
    /// Render pairs; when false only the sync phase runs.
    pub build: bool,
    /// Upper bound on concurrent repository syncs.
    pub jobs: usize,
}

struct SyncJob<'a> {
    kind: Kind,
    name: &'a str,
    url: &'a str,
}

fn sync_jobs<'a>(
    selection: &'a Selection,
    schemes: &'a Registry,
    templates: &'a Registry,
) -> Vec<SyncJob<'a>> {
    let mut jobs = Vec::with_capacity(
        selection.scheme_names.len() + selection.template_names.len(),
    );
    for (registry, names) in [
        (schemes, &selection.scheme_names),
        (templates, &selection.template_names),
    ] {
        for name in names {
            if let Some(entry) = registry.get(name) {
                jobs.push(SyncJob {
                    kind: registry.kind,
                    name: name.as_str(),
                    url: entry.source_url.as_str(),
                });
            }
        }
    }
    jobs
}

#[derive(Default)]
struct Synced<'a> {
    schemes: BTreeMap<&'a str, CachedRepository>,
    templates: BTreeMap<&'a str, CachedRepository>,
}

/// Run the whole pipeline against `cache`.
pub fn run(
    cache: &RepositoryCache,
    options: &PipelineOptions,
    cancel: &CancellationToken,
) -> Result<PipelineOutcome> {
    let schemes = registry::resolve(cache, &options.schemes_source, Kind::Scheme, options.update)?;
    let templates = registry::resolve(
        cache,
        &options.templates_source,
        Kind::Template,
        options.update,
    )?;

    let selection = plan(
        options.scheme.as_deref(),
        options.template.as_deref(),
        &schemes,
        &templates,
    )?;

    let mut outcome = PipelineOutcome {
        changed: schemes.repository.fetched || templates.repository.fetched,
        ..PipelineOutcome::default()
    };

    {
        let synced = sync_selection(
            cache,
            options,
            &selection,
            &schemes,
            &templates,
            cancel,
            &mut outcome,
        );
        if !outcome.cancelled && options.build {
            render_pairs(&selection, &synced, cancel, &mut outcome);
        }
    }
    if outcome.cancelled {
        outcome.errors.push(PipelineError::run(BuilderError::Cancelled));
    }

    outcome.selection = selection;
    Ok(outcome)
}

/// Ensure every selected repository on the bounded pool. Failed syncs are recorded
/// against their scheme or template and left out of the returned map.
fn sync_selection<'a>(
    cache: &RepositoryCache,
    options: &PipelineOptions,
    selection: &'a Selection,
    schemes: &'a Registry,
    templates: &'a Registry,
    cancel: &CancellationToken,
    outcome: &mut PipelineOutcome,
) -> Synced<'a> {
    let jobs = sync_jobs(selection, schemes, templates);
    let results = run_bounded(options.jobs, &jobs, cancel, |job| {
        cache.ensure(job.url, options.update)
    });

    let mut synced = Synced::default();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Some(Ok(repo)) => {
                outcome.changed |= repo.fetched;
                match job.kind {
                    Kind::Scheme => synced.schemes.insert(job.name, repo),
                    Kind::Template => synced.templates.insert(job.name, repo),
                };
            }
            Some(Err(error)) => {
                tracing::warn!(kind = %job.kind, name = job.name, %error, "sync failed");
                outcome.errors.push(scoped_error(job.kind, job.name, error));
            }
            None => outcome.cancelled = true,
        }
    }
    synced
}

fn scoped_error(kind: Kind, name: &str, error: BuilderError) -> PipelineError {
    match kind {
        Kind::Scheme => PipelineError::scheme(name, error),
        Kind::Template => PipelineError::template(name, error),
    }
}

fn render_pairs(
    selection: &Selection,
    synced: &Synced<'_>,
    cancel: &CancellationToken,
    outcome: &mut PipelineOutcome,
) {
    // Decode each family and compile each template once, not once per pair.
    let mut families: BTreeMap<&str, Vec<SchemeVariables>> = BTreeMap::new();
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for (family, repo) in &synced.schemes {
        let loaded = match load_family(&repo.local_path, family) {
            Ok(loaded) => loaded,
            Err(error) => {
                outcome.errors.push(PipelineError::scheme(family, error));
                continue;
            }
        };
        outcome
            .families
            .insert(family.to_string(), loaded.slugs());
        for (slug, error) in loaded.failures {
            outcome.errors.push(PipelineError::scheme(&slug, error));
        }

        let mut members = Vec::with_capacity(loaded.schemes.len());
        for scheme in loaded.schemes {
            // Slugs key the results, so the first family to provide one keeps it.
            if let Some(owner) = owners.get(&scheme.scheme_name) {
                outcome.errors.push(PipelineError::scheme(
                    &scheme.scheme_name,
                    BuilderError::SchemeDecode {
                        scheme: scheme.scheme_name.clone(),
                        reason: format!("also provided by scheme family '{owner}'"),
                    },
                ));
                continue;
            }
            owners.insert(scheme.scheme_name.clone(), *family);
            members.push(scheme);
        }
        families.insert(*family, members);
    }

    let mut templates: BTreeMap<&str, LoadedTemplate> = BTreeMap::new();
    for (name, repo) in &synced.templates {
        match LoadedTemplate::load(&repo.local_path, name) {
            Ok(template) => {
                templates.insert(*name, template);
            }
            Err(error) => outcome.errors.push(PipelineError::template(name, error)),
        }
    }

    for (family, template_name) in selection.pairs() {
        let (Some(members), Some(template)) =
            (families.get(family), templates.get(template_name))
        else {
            continue;
        };

        for scheme in members {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                return;
            }
            let scheme_name = scheme.scheme_name.as_str();
            match template.render(scheme) {
                Ok(pair) => {
                    outcome.warnings.extend(pair.warnings);
                    outcome
                        .results
                        .insert(scheme_name, template_name, pair.outputs);
                }
                Err(error) => {
                    tracing::warn!(scheme = scheme_name, template = template_name, %error, "render failed");
                    outcome
                        .errors
                        .push(PipelineError::pair(scheme_name, template_name, error));
                }
            }
        }
    }
}
