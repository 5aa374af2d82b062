use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "base16-builder",
    about = "Build base16 color schemes into application templates",
    version
)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that touches the registries.
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Cache directory (default: $XDG_CACHE_HOME or ~/.cache)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Git URL of the scheme registry
    #[arg(long, value_name = "URL")]
    pub schemes_source: Option<String>,

    /// Git URL of the template registry
    #[arg(long, value_name = "URL")]
    pub templates_source: Option<String>,

    /// Maximum number of repositories synced at once
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render schemes into templates
    Build {
        /// Only build this scheme
        #[arg(short, long)]
        scheme: Option<String>,

        /// Only build this template
        #[arg(short, long)]
        template: Option<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Pull repositories that are already cached
        #[arg(long)]
        update: bool,

        /// Sync repositories without rendering anything
        #[arg(long)]
        no_build: bool,

        /// Write rendered files under this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync every registry and repository without rendering
    Update {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the names a registry offers
    List {
        #[arg(value_enum)]
        kind: ListKind,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Inspect or clear the repository cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Cache directory (default: $XDG_CACHE_HOME or ~/.cache)
        #[arg(long, global = true)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ListKind {
    Schemes,
    Templates,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached repositories
    List,

    /// Remove one cached repository, or all of them
    Clear {
        /// Source URL of the repository to remove
        url: Option<String>,
    },
}
