//! Project-wide text search.
//!
//! Prefers ripgrep; when it is not installed the search falls back to
//! `git grep` over tracked files. Exit code 1 from either tool means
//! "no matches" and is not an error.

use tracing::{debug, warn};

use crate::error::{Result, SkillError};
use crate::exec;

/// How a search was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Ripgrep,
    GitGrep,
}

/// Outcome of a search: the matching lines (one per match, `path:line:text`)
/// and which tool produced them.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub backend: SearchBackend,
    pub matches: String,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.matches.trim().is_empty()
    }
}

/// Build the ripgrep invocation for `pattern`.
///
/// `include_external` additionally searches hidden and gitignored files.
pub fn ripgrep_args(pattern: &str, include_external: bool) -> Vec<String> {
    let mut args: Vec<String> = ["rg", "-n", "--smart-case", "--color=never"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if include_external {
        args.push("-uu".into());
    }
    args.push(pattern.to_owned());
    args
}

/// Build the `git grep` fallback invocation for `pattern`.
pub fn git_grep_args(pattern: &str) -> Vec<String> {
    ["git", "grep", "-I", "-n"]
        .iter()
        .map(|s| s.to_string())
        .chain([pattern.to_owned()])
        .collect()
}

/// Search the current project for `pattern`.
pub async fn search(pattern: &str, include_external: bool) -> Result<SearchResult> {
    if pattern.is_empty() {
        return Err(SkillError::InvalidInput {
            skill: "search".into(),
            reason: "search pattern must not be empty".into(),
        });
    }

    if exec::check_command("rg", "--version").await {
        let output = exec::run(&ripgrep_args(pattern, include_external), 120).await?;
        // rg exits 1 when nothing matched, 2 on real errors
        if output.exit_code <= 1 {
            debug!(pattern = pattern, backend = "ripgrep", "search complete");
            return Ok(SearchResult {
                backend: SearchBackend::Ripgrep,
                matches: output.stdout.trim().to_owned(),
            });
        }
        return Err(SkillError::CommandFailed {
            program: "rg".into(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    // git grep only sees tracked files, so it cannot honor include_external.
    if !include_external {
        warn!("ripgrep not found, falling back to git grep");
        let output = exec::run(&git_grep_args(pattern), 120).await?;
        if output.exit_code <= 1 {
            return Ok(SearchResult {
                backend: SearchBackend::GitGrep,
                matches: output.stdout.trim().to_owned(),
            });
        }
    }

    Err(SkillError::ToolMissing {
        tool: "rg".into(),
        hint: "install ripgrep (https://github.com/BurntSushi/ripgrep); \
               git grep is used as a fallback for tracked files only"
            .into(),
    })
}
