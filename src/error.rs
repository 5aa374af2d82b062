#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::registry::Kind;

#[derive(Debug, Error, Diagnostic)]
pub enum BuilderError {
    #[error("Failed to sync {kind} registry {url}: {reason}")]
    #[diagnostic(help("Check the registry URL and your network connection"))]
    RegistrySync {
        kind: Kind,
        url: String,
        reason: String,
    },

    #[error("Malformed {kind} registry at {path}: {reason}")]
    #[diagnostic(help("The registry must contain a list.yaml mapping names to git URLs"))]
    RegistryDecode {
        kind: Kind,
        path: PathBuf,
        reason: String,
    },

    #[error("Unknown {kind} '{name}'")]
    #[diagnostic(help("Run `base16-builder list {kind}s` to see the available names"))]
    UnknownName { kind: Kind, name: String },

    #[error("Failed to sync repository {url}: {reason}")]
    #[diagnostic(help("Check the URL and your network connection"))]
    Sync { url: String, reason: String },

    #[error("Invalid template config in {path}: {reason}")]
    #[diagnostic(help("Templates need a templates/config.yaml mapping file stems to an extension"))]
    TemplateConfig { path: PathBuf, reason: String },

    #[error("Failed to decode scheme '{scheme}': {reason}")]
    SchemeDecode { scheme: String, reason: String },

    #[error("Failed to render {file}")]
    #[diagnostic(help("Check the mustache syntax of the template file"))]
    TemplateRender {
        file: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    #[error("Failed to parse template {file}")]
    #[diagnostic(help("Check the mustache syntax of the template file"))]
    TemplateParse {
        file: String,
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    #[error("Build cancelled before every repository was synced")]
    Cancelled,

    #[error("No scheme/template pair rendered successfully")]
    #[diagnostic(help("Every selected pair failed; see the errors listed above"))]
    NoPairsRendered,

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse user config {path}")]
    #[diagnostic(help("Check the TOML syntax in your config file"))]
    UserConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Cache metadata error: {context}")]
    #[diagnostic(help("Try clearing the cache with `base16-builder cache clear`"))]
    CacheMetadata { context: String },

    #[error("git executable not found")]
    #[diagnostic(help("Install git and make sure it is on your PATH"))]
    GitNotFound,
}

impl BuilderError {
    /// Whether this error aborts the whole run rather than a single pair.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RegistrySync { .. }
                | Self::RegistryDecode { .. }
                | Self::UnknownName { .. }
                | Self::NoPairsRendered
        )
    }
}

pub type Result<T> = std::result::Result<T, BuilderError>;
