use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base16_builder::pipeline::{CancellationToken, RenderResult};
use base16_builder::source::SystemGit;
use base16_builder::{invoke, BuildRequest, Invocation};
use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};

use crate::cli::SourceArgs;

pub struct BuildArgs {
    pub scheme: Option<String>,
    pub template: Option<String>,
    pub source: SourceArgs,
    pub update: bool,
    pub build: bool,
    pub output: Option<PathBuf>,
}

pub fn run(args: BuildArgs, json: bool) -> Result<()> {
    let mut request = BuildRequest {
        scheme: args.scheme,
        template: args.template,
        update: args.update,
        build: args.build,
        ..BuildRequest::default()
    };
    let settings = super::resolve_settings(&mut request, args.source)?;

    let invocation = invoke(
        &request,
        &settings,
        Arc::new(SystemGit::new()),
        &CancellationToken::new(),
    );

    if let Some(dir) = &args.output {
        let written = write_outputs(dir, &invocation.schemes)?;
        if !json {
            println!(
                "{} Wrote {} file{} to {}",
                style("✓").green().bold(),
                written,
                if written == 1 { "" } else { "s" },
                style(dir.display()).cyan()
            );
        }
    }

    if json {
        let out = serde_json::to_string_pretty(&invocation).into_diagnostic()?;
        println!("{out}");
    } else {
        print_summary(&invocation);
    }

    finish(invocation)
}

/// Turn a failed invocation into an error exit.
pub(super) fn finish(invocation: Invocation) -> Result<()> {
    if invocation.failed {
        let message = invocation
            .message
            .unwrap_or_else(|| "build failed".to_string());
        return Err(miette::miette!("{message}"));
    }
    Ok(())
}

pub(super) fn print_summary(invocation: &Invocation) {
    for warning in &invocation.warnings {
        eprintln!("{} {}", style("warning:").yellow().bold(), warning);
    }
    for error in &invocation.errors {
        eprintln!("{} {}", style("error:").red().bold(), error);
    }

    let pairs = invocation.schemes.pair_count();
    if pairs > 0 {
        println!(
            "{} Rendered {} pair{}",
            style("✓").green().bold(),
            pairs,
            if pairs == 1 { "" } else { "s" }
        );
    }

    if invocation.changed {
        println!("{} Repositories changed", style("↻").cyan());
    } else {
        println!("{} Repositories already up to date", style("✓").green().bold());
    }
}

fn write_outputs(dir: &Path, results: &RenderResult) -> Result<usize> {
    let mut written = 0;
    for (scheme, template, name, content) in results.files() {
        let relative = Path::new(scheme).join(template).join(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(miette::miette!(
                "refusing to write {} outside {}",
                relative.display(),
                dir.display()
            ));
        }
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .wrap_err_with(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&path, content)
            .into_diagnostic()
            .wrap_err_with(|| format!("writing {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
