use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::{BuilderError, Result};

const TEMPLATES_DIR: &str = "templates";
const CONFIG_STEM: &str = "config";
const TEMPLATE_SUFFIX: &str = ".mustache";
const DEFAULT_PREFIX: &str = "base16";

/// One entry of `templates/config.yaml` as written by template authors.
#[derive(Debug, Clone, Deserialize)]
struct RawOutput {
    #[serde(default)]
    extension: String,
    output: Option<String>,
    prefix: Option<String>,
}

/// A single file a template repository renders per scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Stem of the `.mustache` file, which is also the config key.
    pub stem: String,
    pub source_path: PathBuf,
    /// Output directory declared by the template, if any.
    pub output_dir: Option<String>,
    pub prefix: String,
    pub extension: String,
}

impl OutputFile {
    /// `base16` + `tomorrow-night` + `.sh` gives `base16-tomorrow-night.sh`,
    /// nested under the declared output directory when there is one.
    pub fn output_name(&self, scheme: &str) -> String {
        let file_name = format!("{}-{}{}", self.prefix, scheme, self.extension);
        match &self.output_dir {
            Some(dir) => format!("{dir}/{file_name}"),
            None => file_name,
        }
    }
}

/// Rendering configuration of one template repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    pub path: PathBuf,
    pub outputs: Vec<OutputFile>,
}

fn find_config(templates_dir: &Path) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| templates_dir.join(format!("{CONFIG_STEM}.{ext}")))
        .find(|p| p.is_file())
}

/// Load `templates/config.yaml` (or `.yml`) from a template repository checkout.
pub fn load_template_config(repo_dir: &Path) -> Result<TemplateConfig> {
    let templates_dir = repo_dir.join(TEMPLATES_DIR);
    let Some(path) = find_config(&templates_dir) else {
        return Err(BuilderError::TemplateConfig {
            path: templates_dir.join(format!("{CONFIG_STEM}.yaml")),
            reason: "config file not found".into(),
        });
    };

    let content = std::fs::read_to_string(&path).map_err(|e| BuilderError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })?;

    let invalid = |reason: String| BuilderError::TemplateConfig {
        path: path.clone(),
        reason,
    };

    let raw: BTreeMap<String, RawOutput> = if content.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?
    };

    let mut outputs = Vec::with_capacity(raw.len());
    for (stem, entry) in raw {
        if let Some(dir) = &entry.output {
            if !is_relative_subpath(dir) {
                return Err(invalid(format!(
                    "output directory '{dir}' of '{stem}' must be a relative path inside the output tree"
                )));
            }
        }
        let prefix = entry.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        if prefix.contains(['/', '\\']) || entry.extension.contains(['/', '\\']) {
            return Err(invalid(format!(
                "prefix and extension of '{stem}' must not contain path separators"
            )));
        }

        outputs.push(OutputFile {
            source_path: templates_dir.join(format!("{stem}{TEMPLATE_SUFFIX}")),
            output_dir: entry.output.filter(|d| !d.is_empty()),
            prefix,
            extension: entry.extension,
            stem,
        });
    }

    // Outputs are keyed by composed name, so two entries must never compose the same one.
    let mut seen = BTreeSet::new();
    for output in &outputs {
        let key = output.output_name("{scheme}");
        if !seen.insert(key.clone()) {
            return Err(invalid(format!("more than one entry renders to '{key}'")));
        }
    }

    Ok(TemplateConfig { path, outputs })
}

fn is_relative_subpath(dir: &str) -> bool {
    Path::new(dir)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
