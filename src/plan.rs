use std::collections::BTreeSet;

use crate::error::{BuilderError, Result};
use crate::registry::{Kind, Registry};

/// The exact scheme and template names one run processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub scheme_names: BTreeSet<String>,
    pub template_names: BTreeSet<String>,
}

impl Selection {
    /// Every (scheme, template) pair in sorted order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.scheme_names.iter().flat_map(move |scheme| {
            self.template_names
                .iter()
                .map(move |template| (scheme.as_str(), template.as_str()))
        })
    }

    pub fn pair_count(&self) -> usize {
        self.scheme_names.len() * self.template_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }
}

fn select(filter: Option<&str>, registry: &Registry) -> Result<BTreeSet<String>> {
    match filter {
        Some(name) if registry.contains(name) => Ok(BTreeSet::from([name.to_string()])),
        Some(name) => Err(BuilderError::UnknownName {
            kind: registry.kind,
            name: name.to_string(),
        }),
        None => Ok(registry.names().map(String::from).collect()),
    }
}

/// Choose the schemes and templates to process. No filter selects the whole registry.
pub fn plan(
    scheme_filter: Option<&str>,
    template_filter: Option<&str>,
    schemes: &Registry,
    templates: &Registry,
) -> Result<Selection> {
    debug_assert_eq!(schemes.kind, Kind::Scheme);
    debug_assert_eq!(templates.kind, Kind::Template);

    let selection = Selection {
        scheme_names: select(scheme_filter, schemes)?,
        template_names: select(template_filter, templates)?,
    };
    tracing::debug!(
        schemes = selection.scheme_names.len(),
        templates = selection.template_names.len(),
        "planned selection"
    );
    Ok(selection)
}
