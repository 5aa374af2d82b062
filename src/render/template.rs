use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::config::{load_scheme, load_template_config, OutputFile, SchemeVariables, TemplateConfig};
use crate::error::{BuilderError, Result};
use crate::render::engine::{unresolved_names, Engine};
use crate::source::CachedRepository;

/// Rendered files of one (scheme, template) pair, keyed by output name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPair {
    pub outputs: BTreeMap<String, String>,
    /// Unresolved variables that rendered as empty strings.
    pub warnings: Vec<String>,
}

struct CompiledOutput {
    output: OutputFile,
    /// Name the file is registered under in the engine.
    id: String,
    text: String,
}

/// A template repository with its config read and every output compiled.
pub struct LoadedTemplate {
    pub name: String,
    pub config: TemplateConfig,
    engine: Engine,
    outputs: Vec<CompiledOutput>,
}

impl fmt::Debug for LoadedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedTemplate")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LoadedTemplate {
    pub fn load(repo_dir: &Path, name: &str) -> Result<Self> {
        let config = load_template_config(repo_dir)?;
        let mut engine = Engine::new();
        let mut outputs = Vec::with_capacity(config.outputs.len());

        for output in &config.outputs {
            if !output.source_path.is_file() {
                return Err(BuilderError::TemplateConfig {
                    path: config.path.clone(),
                    reason: format!(
                        "'{}' is declared but {} does not exist",
                        output.stem,
                        output.source_path.display()
                    ),
                });
            }
            let text = std::fs::read_to_string(&output.source_path).map_err(|e| {
                BuilderError::Io {
                    context: format!("reading {}", output.source_path.display()),
                    source: e,
                }
            })?;

            let id = format!("{name}/{}.mustache", output.stem);
            engine.register(&id, &text)?;
            outputs.push(CompiledOutput {
                output: output.clone(),
                id,
                text,
            });
        }

        Ok(Self {
            name: name.to_string(),
            config,
            engine,
            outputs,
        })
    }

    /// Render every declared output against one scheme.
    pub fn render(&self, scheme: &SchemeVariables) -> Result<RenderedPair> {
        let mut rendered = RenderedPair::default();

        for compiled in &self.outputs {
            for missing in unresolved_names(&compiled.text, &scheme.variables) {
                tracing::warn!(
                    template = %compiled.id,
                    scheme = %scheme.scheme_name,
                    variable = %missing,
                    "unresolved template variable rendered empty"
                );
                rendered.warnings.push(format!(
                    "{}: '{missing}' is not defined by scheme '{}' and rendered empty",
                    compiled.id, scheme.scheme_name
                ));
            }

            let content = self.engine.render(&compiled.id, &scheme.variables)?;
            rendered
                .outputs
                .insert(compiled.output.output_name(&scheme.scheme_name), content);
        }

        Ok(rendered)
    }
}

/// Render one template repository against one scheme repository.
pub fn render(
    template_repo: &CachedRepository,
    scheme_repo: &CachedRepository,
    scheme_name: &str,
    template_name: &str,
) -> Result<RenderedPair> {
    let template = LoadedTemplate::load(&template_repo.local_path, template_name)?;
    let scheme = load_scheme(&scheme_repo.local_path, scheme_name)?;
    template.render(&scheme)
}
