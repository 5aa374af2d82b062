use std::path::Path;
use std::process::{Command, Output};

use crate::error::{BuilderError, Result};
use crate::source::RepoSync;

/// Stderr markers of common git failures, each with the hint shown for it.
/// The first row with any matching marker wins.
const KNOWN_FAILURES: &[(&[&str], &str)] = &[
    (
        &["Authentication failed", "could not read Username"],
        "authentication failed; configure git credentials with `gh auth login` or set up SSH keys",
    ),
    (
        &["Repository not found", "' not found", "does not appear to be a git repository"],
        "repository not found; check the registry entry's URL",
    ),
    (
        &["Host key verification failed"],
        "SSH host key verification failed; add the host with ssh-keyscan",
    ),
    (
        &["Could not resolve host", "Connection refused", "timed out"],
        "network error; check your connection and the repository URL",
    ),
    (
        &["Not possible to fast-forward", "diverging"],
        "local checkout has diverged from upstream; clear it with `base16-builder cache clear <url>`",
    ),
];

fn classify_git_error(stderr: &str) -> String {
    KNOWN_FAILURES
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| stderr.contains(m)))
        .map_or_else(
            || stderr.to_string(),
            |(_, hint)| format!("{hint}\n\ngit output:\n{stderr}"),
        )
}

/// Repository sync backed by the system `git` binary, so that the user's full
/// credential stack (SSH agent, credential helpers, `gh auth`, etc.) is
/// inherited automatically.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemGit;

impl SystemGit {
    pub fn new() -> Self {
        Self
    }

    fn ensure_available() -> Result<()> {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|_| ())
            .map_err(|_| BuilderError::GitNotFound)
    }

    fn run(mut cmd: Command, what: &str) -> Result<Output> {
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.output().map_err(|e| BuilderError::Io {
            context: format!("running git {what}"),
            source: e,
        })
    }

    fn head(dest: &Path) -> Result<Option<String>> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(dest).arg("rev-parse").arg("HEAD");
        let output = Self::run(cmd, "rev-parse HEAD")?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }
}

impl RepoSync for SystemGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        if url.starts_with("http://") {
            tracing::warn!(url, "using insecure http:// URL; consider https:// instead");
        }
        Self::ensure_available()?;

        let mut cmd = Command::new("git");
        cmd.arg("clone").arg("--quiet").arg(url).arg(dest);
        let output = Self::run(cmd, "clone")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuilderError::Sync {
                url: url.to_string(),
                reason: classify_git_error(stderr.trim()),
            });
        }
        Ok(())
    }

    fn pull(&self, url: &str, dest: &Path) -> Result<bool> {
        Self::ensure_available()?;
        let before = Self::head(dest)?;

        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(dest)
            .arg("pull")
            .arg("--ff-only")
            .arg("--quiet");
        let output = Self::run(cmd, "pull")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuilderError::Sync {
                url: url.to_string(),
                reason: classify_git_error(stderr.trim()),
            });
        }

        let after = Self::head(dest)?;
        Ok(before != after)
    }
}
