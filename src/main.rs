mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("base16_builder=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("base16_builder=warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            scheme,
            template,
            source,
            update,
            no_build,
            output,
            json,
        } => commands::build::run(
            commands::build::BuildArgs {
                scheme,
                template,
                source,
                update,
                build: !no_build,
                output,
            },
            json,
        ),
        Commands::Update { source, json } => commands::update::run(source, json),
        Commands::List { kind, source } => commands::list::run(kind, source),
        Commands::Cache { action, cache_dir } => commands::cache::run(action, cache_dir),
    }
}
