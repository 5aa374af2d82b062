use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use serde::Serialize;

use crate::error::BuilderError;
use crate::plan::Selection;

pub type TemplateOutputs = BTreeMap<String, String>;

/// `scheme → template → output name → rendered content`.
///
/// Only pairs that rendered successfully appear; every omitted pair has a
/// matching entry in [`PipelineOutcome::errors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RenderResult(BTreeMap<String, BTreeMap<String, TemplateOutputs>>);

impl RenderResult {
    pub fn insert(&mut self, scheme: &str, template: &str, outputs: TemplateOutputs) {
        self.0
            .entry(scheme.to_string())
            .or_default()
            .insert(template.to_string(), outputs);
    }

    pub fn get(&self, scheme: &str, template: &str) -> Option<&TemplateOutputs> {
        self.0.get(scheme).and_then(|templates| templates.get(template))
    }

    pub fn contains_pair(&self, scheme: &str, template: &str) -> bool {
        self.get(scheme, template).is_some()
    }

    /// Number of (scheme, template) entries.
    pub fn pair_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every rendered file as `(scheme, template, output name, content)`.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.0.iter().flat_map(|(scheme, templates)| {
            templates.iter().flat_map(move |(template, outputs)| {
                outputs.iter().map(move |(name, content)| {
                    (scheme.as_str(), template.as_str(), name.as_str(), content.as_str())
                })
            })
        })
    }

    pub fn into_inner(self) -> BTreeMap<String, BTreeMap<String, TemplateOutputs>> {
        self.0
    }
}

impl Index<&str> for RenderResult {
    type Output = BTreeMap<String, TemplateOutputs>;

    fn index(&self, scheme: &str) -> &Self::Output {
        &self.0[scheme]
    }
}

/// A recoverable failure, scoped to the scheme and/or template it affected.
///
/// A scheme-only error (template `None`) removed every pair of that scheme,
/// and likewise for template-only errors. Neither set means the whole run.
#[derive(Debug)]
pub struct PipelineError {
    pub scheme: Option<String>,
    pub template: Option<String>,
    pub error: BuilderError,
}

impl PipelineError {
    pub fn scheme(name: &str, error: BuilderError) -> Self {
        Self {
            scheme: Some(name.to_string()),
            template: None,
            error,
        }
    }

    pub fn template(name: &str, error: BuilderError) -> Self {
        Self {
            scheme: None,
            template: Some(name.to_string()),
            error,
        }
    }

    pub fn pair(scheme: &str, template: &str, error: BuilderError) -> Self {
        Self {
            scheme: Some(scheme.to_string()),
            template: Some(template.to_string()),
            error,
        }
    }

    pub fn run(error: BuilderError) -> Self {
        Self {
            scheme: None,
            template: None,
            error,
        }
    }

    /// Whether this error explains the absence of the given pair.
    pub fn affects(&self, scheme: &str, template: &str) -> bool {
        self.scheme.as_deref().map_or(true, |s| s == scheme)
            && self.template.as_deref().map_or(true, |t| t == template)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scheme, &self.template) {
            (Some(s), Some(t)) => write!(f, "{s}/{t}: {}", self.error),
            (Some(s), None) => write!(f, "scheme {s}: {}", self.error),
            (None, Some(t)) => write!(f, "template {t}: {}", self.error),
            (None, None) => write!(f, "{}", self.error),
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    /// True iff any repository (registries included) was cloned or advanced.
    pub changed: bool,
    pub results: RenderResult,
    pub errors: Vec<PipelineError>,
    /// Non-fatal diagnostics such as unresolved template variables.
    pub warnings: Vec<String>,
    pub selection: Selection,
    /// Scheme slugs found in each loaded family, decoded or not.
    pub families: BTreeMap<String, Vec<String>>,
    pub cancelled: bool,
}

impl PipelineOutcome {
    /// `(scheme, template)` pairs that were selected but are not in the results.
    ///
    /// A family that never loaded stands in for its schemes under the family name.
    pub fn missing_pairs(&self) -> Vec<(&str, &str)> {
        let mut missing = Vec::new();
        for (family, template) in self.selection.pairs() {
            match self.families.get(family) {
                Some(slugs) => missing.extend(
                    slugs
                        .iter()
                        .map(|slug| (slug.as_str(), template))
                        .filter(|(s, t)| !self.results.contains_pair(s, t)),
                ),
                None => missing.push((family, template)),
            }
        }
        missing
    }
}
