use std::sync::Arc;

use base16_builder::pipeline::CancellationToken;
use base16_builder::source::SystemGit;
use base16_builder::{invoke, BuildRequest};
use miette::{IntoDiagnostic, Result};

use crate::cli::SourceArgs;

pub fn run(source: SourceArgs, json: bool) -> Result<()> {
    let mut request = BuildRequest {
        update: true,
        build: false,
        ..BuildRequest::default()
    };
    let settings = super::resolve_settings(&mut request, source)?;

    let invocation = invoke(
        &request,
        &settings,
        Arc::new(SystemGit::new()),
        &CancellationToken::new(),
    );

    if json {
        let out = serde_json::to_string_pretty(&invocation).into_diagnostic()?;
        println!("{out}");
    } else {
        super::build::print_summary(&invocation);
    }

    super::build::finish(invocation)
}
