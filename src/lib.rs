pub mod config;
pub mod error;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod render;
pub mod source;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{BuilderError, Result};
use crate::pipeline::{CancellationToken, PipelineOptions, PipelineOutcome, RenderResult};
use crate::source::{RepoSync, RepositoryCache};

/// The inputs of one build, as supplied by a caller.
///
/// Unset optional fields fall back to the user config file and then to the
/// built-in defaults (see [`Settings::resolve`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRequest {
    pub scheme: Option<String>,
    pub template: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub schemes_source: Option<String>,
    pub templates_source: Option<String>,
    pub update: bool,
    pub build: bool,
    pub jobs: Option<usize>,
}

impl Default for BuildRequest {
    fn default() -> Self {
        Self {
            scheme: None,
            template: None,
            cache_dir: None,
            schemes_source: None,
            templates_source: None,
            update: false,
            build: true,
            jobs: None,
        }
    }
}

/// The record handed back to the caller after [`invoke`].
#[derive(Debug, Default, Serialize)]
pub struct Invocation {
    pub changed: bool,
    pub failed: bool,
    pub schemes: RenderResult,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Run the pipeline for `request` with already-resolved `settings`.
pub fn build(
    request: &BuildRequest,
    settings: &Settings,
    syncer: Arc<dyn RepoSync>,
    cancel: &CancellationToken,
) -> Result<PipelineOutcome> {
    let cache = RepositoryCache::new(&settings.cache_root, syncer);
    let options = PipelineOptions {
        scheme: request.scheme.clone(),
        template: request.template.clone(),
        schemes_source: settings.schemes_source.clone(),
        templates_source: settings.templates_source.clone(),
        update: request.update,
        build: request.build,
        jobs: settings.jobs,
    };
    pipeline::run(&cache, &options, cancel)
}

/// Run a build and fold the outcome into an [`Invocation`] record.
///
/// Fatal errors and cancellation set `failed`. So does a build that selected
/// pairs but rendered none of them.
pub fn invoke(
    request: &BuildRequest,
    settings: &Settings,
    syncer: Arc<dyn RepoSync>,
    cancel: &CancellationToken,
) -> Invocation {
    match build(request, settings, syncer, cancel) {
        Ok(outcome) => summarize(request, outcome),
        Err(e) => {
            tracing::error!(error = %e, "build aborted");
            Invocation {
                failed: true,
                message: Some(e.to_string()),
                ..Invocation::default()
            }
        }
    }
}

fn summarize(request: &BuildRequest, outcome: PipelineOutcome) -> Invocation {
    let mut errors: Vec<String> = outcome.errors.iter().map(ToString::to_string).collect();
    let mut message = None;

    let nothing_rendered = request.build
        && !outcome.cancelled
        && !outcome.selection.is_empty()
        && outcome.results.is_empty();
    if outcome.cancelled {
        message = Some(BuilderError::Cancelled.to_string());
    } else if nothing_rendered {
        let e = BuilderError::NoPairsRendered;
        message = Some(e.to_string());
        errors.push(e.to_string());
    }

    Invocation {
        changed: outcome.changed,
        failed: message.is_some(),
        schemes: outcome.results,
        errors,
        warnings: outcome.warnings,
        message,
    }
}
