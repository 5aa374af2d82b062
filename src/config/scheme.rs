use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use walkdir::WalkDir;

use crate::config::is_safe_name;
use crate::error::{BuilderError, Result};

/// The substitution context for one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeVariables {
    pub scheme_name: String,
    pub variables: BTreeMap<String, String>,
}

impl SchemeVariables {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }
}

/// Scheme file stems compare lowercased with spaces turned into dashes.
pub fn slugify(stem: &str) -> String {
    stem.to_lowercase().replace(' ', "-")
}

fn scheme_files(repo_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(repo_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let hidden = p
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'));
            let yaml = p
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            yaml && !hidden
        })
        .collect();
    files.sort();
    files
}

/// Pick the scheme file for `scheme_name`: an exact slug match wins and a lone
/// scheme file is accepted under any name.
fn select_scheme_file(repo_dir: &Path, scheme_name: &str) -> Result<PathBuf> {
    let files = scheme_files(repo_dir);

    let by_slug = files.iter().find(|p| file_slug(p) == scheme_name);
    if let Some(path) = by_slug {
        return Ok(path.clone());
    }

    match files.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(BuilderError::SchemeDecode {
            scheme: scheme_name.to_string(),
            reason: format!("no scheme file found in {}", repo_dir.display()),
        }),
        _ => Err(BuilderError::SchemeDecode {
            scheme: scheme_name.to_string(),
            reason: format!(
                "none of the {} scheme files in {} is named {scheme_name}.yaml",
                files.len(),
                repo_dir.display()
            ),
        }),
    }
}

fn file_slug(path: &Path) -> String {
    path.file_stem()
        .map(|s| slugify(&s.to_string_lossy()))
        .unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // An empty string keeps `false` falsy inside sections.
        Value::Bool(true) => Some("true".to_string()),
        Value::Bool(false) => Some(String::new()),
        _ => None,
    }
}

fn read_scheme_file(path: &Path, scheme_name: &str) -> Result<SchemeVariables> {
    let content = std::fs::read_to_string(path).map_err(|e| BuilderError::Io {
        context: format!("reading scheme file {}", path.display()),
        source: e,
    })?;
    parse_scheme(&content, scheme_name)
}

/// Decode one scheme of a cached scheme repository into template variables.
pub fn load_scheme(repo_dir: &Path, scheme_name: &str) -> Result<SchemeVariables> {
    let path = select_scheme_file(repo_dir, scheme_name)?;
    read_scheme_file(&path, scheme_name)
}

/// Every scheme a family repository provides.
///
/// Each scheme file is its own scheme, named by the slug of its file stem.
/// A file that fails to decode is reported in `failures` without affecting
/// its siblings.
#[derive(Debug)]
pub struct SchemeFamily {
    pub name: String,
    /// Decoded schemes in slug order.
    pub schemes: Vec<SchemeVariables>,
    pub failures: Vec<(String, BuilderError)>,
}

impl SchemeFamily {
    /// Slugs of every scheme file found, decoded or not.
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .schemes
            .iter()
            .map(|s| s.scheme_name.clone())
            .chain(self.failures.iter().map(|(slug, _)| slug.clone()))
            .collect();
        slugs.sort();
        slugs.dedup();
        slugs
    }
}

/// Load every scheme file at the top level of a family repository.
pub fn load_family(repo_dir: &Path, family: &str) -> Result<SchemeFamily> {
    let files = scheme_files(repo_dir);
    if files.is_empty() {
        return Err(BuilderError::SchemeDecode {
            scheme: family.to_string(),
            reason: format!("no scheme file found in {}", repo_dir.display()),
        });
    }

    let mut loaded = SchemeFamily {
        name: family.to_string(),
        schemes: Vec::with_capacity(files.len()),
        failures: Vec::new(),
    };
    let mut seen = BTreeSet::new();
    for path in &files {
        let slug = file_slug(path);
        if !is_safe_name(&slug) {
            loaded.failures.push((
                slug.clone(),
                BuilderError::SchemeDecode {
                    scheme: slug,
                    reason: format!("{} does not name a usable scheme", path.display()),
                },
            ));
            continue;
        }
        if !seen.insert(slug.clone()) {
            loaded.failures.push((
                slug.clone(),
                BuilderError::SchemeDecode {
                    scheme: slug,
                    reason: format!("{} repeats a scheme name", path.display()),
                },
            ));
            continue;
        }
        match read_scheme_file(path, &slug) {
            Ok(scheme) => loaded.schemes.push(scheme),
            Err(e) => loaded.failures.push((slug, e)),
        }
    }

    loaded
        .schemes
        .sort_by(|a, b| a.scheme_name.cmp(&b.scheme_name));
    tracing::debug!(
        family,
        schemes = loaded.schemes.len(),
        failures = loaded.failures.len(),
        "loaded scheme family"
    );
    Ok(loaded)
}

pub fn parse_scheme(content: &str, scheme_name: &str) -> Result<SchemeVariables> {
    let decode_err = |reason: String| BuilderError::SchemeDecode {
        scheme: scheme_name.to_string(),
        reason,
    };

    let doc: Value = serde_yaml::from_str(content).map_err(|e| decode_err(e.to_string()))?;
    let Value::Mapping(mapping) = doc else {
        return Err(decode_err("scheme file is not a mapping".into()));
    };

    let mut raw = BTreeMap::new();
    for (key, value) in &mapping {
        let (Some(key), Some(value)) = (scalar_to_string(key), scalar_to_string(value)) else {
            continue;
        };
        raw.insert(key, value);
    }

    let mut variables = raw.clone();
    variables.insert("scheme-slug".into(), scheme_name.to_string());
    variables.insert(
        "scheme-name".into(),
        raw.get("scheme")
            .cloned()
            .unwrap_or_else(|| scheme_name.to_string()),
    );
    if let Some(author) = raw.get("author") {
        variables.insert("scheme-author".into(), author.clone());
    }

    for index in 0..16u8 {
        let base = format!("base{index:02X}");
        if let Some(hex) = raw.get(&base) {
            insert_base_variables(&mut variables, &base, hex);
        }
    }

    Ok(SchemeVariables {
        scheme_name: scheme_name.to_string(),
        variables,
    })
}

fn insert_base_variables(variables: &mut BTreeMap<String, String>, base: &str, hex: &str) {
    let key = format!("{base}-hex");
    variables.insert(key.clone(), hex.to_string());

    for (channel, range) in [("r", 0..2), ("g", 2..4), ("b", 4..6)] {
        let Some(byte) = hex.get(range) else {
            continue;
        };
        variables.insert(format!("{key}-{channel}"), byte.to_string());

        // Colours are not validated; a channel that is not hex just has no numeric forms.
        let Ok(value) = u8::from_str_radix(byte, 16) else {
            tracing::debug!(base, channel, byte, "skipping non-hex colour channel");
            continue;
        };
        variables.insert(format!("{key}-rgb-{channel}"), value.to_string());
        variables.insert(
            format!("{key}-dec-{channel}"),
            format!("{:?}", f64::from(value) / 255.0),
        );
    }
}
