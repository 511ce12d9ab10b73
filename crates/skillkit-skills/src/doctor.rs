//! Environment diagnostics.
//!
//! Checks that the external tools the skills shell out to are installed
//! and that the bundle and API credentials are in place.

use serde::Serialize;

use crate::browser;
use crate::config;
use crate::error::Result;
use crate::exec;

/// Outcome of one diagnostic check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, details: Option<String>) -> Self {
        Self {
            name: name.to_owned(),
            passed: true,
            details,
        }
    }

    fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_owned(),
            passed: false,
            details: Some(details.to_owned()),
        }
    }
}

/// Run every check. Failures are results, not errors.
pub async fn run_checks() -> Result<Vec<CheckResult>> {
    let mut results = Vec::new();

    results.push(check_tool("ffmpeg (video/audio processing)", "ffmpeg", "-version").await);
    results.push(check_tool("ffprobe (media inspection)", "ffprobe", "-version").await);
    results.push(check_tool("ImageMagick (image processing)", "magick", "-version").await);
    results.push(check_tool("ripgrep (project search)", "rg", "--version").await);
    results.push(check_tool("git (search fallback)", "git", "--version").await);
    results.push(check_chrome());
    results.push(check_bundle());
    results.push(check_api_key());

    Ok(results)
}

/// True when every check passed.
pub fn all_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|r| r.passed)
}

async fn check_tool(name: &str, program: &str, version_flag: &str) -> CheckResult {
    // First line of the version output is enough detail.
    let argv = vec![program.to_owned(), version_flag.to_owned()];
    match exec::run(&argv, 10).await {
        Ok(output) if output.success() => {
            let version = output
                .stdout
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_owned();
            CheckResult::pass(name, (!version.is_empty()).then_some(version))
        }
        _ => CheckResult::fail(name, &format!("`{program}` not found on PATH")),
    }
}

fn check_chrome() -> CheckResult {
    let name = "Chrome/Chromium (browser automation)";
    match browser::find_chrome_path(None) {
        Ok(path) => CheckResult::pass(name, Some(path)),
        Err(_) => CheckResult::fail(
            name,
            "no Chrome binary found; install Chrome or pass --chrome-path",
        ),
    }
}

fn check_bundle() -> CheckResult {
    let name = "Skill bundle (.skillkit)";
    let root = config::project_root();
    let bundle = config::bundle_dir(&root);
    if bundle.is_dir() {
        CheckResult::pass(name, Some(bundle.display().to_string()))
    } else {
        CheckResult::fail(name, &format!("{} not found", bundle.display()))
    }
}

fn check_api_key() -> CheckResult {
    let name = "Gemini API key";
    let has_key = std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    if has_key {
        CheckResult::pass(name, None)
    } else {
        CheckResult::fail(
            name,
            "GEMINI_API_KEY not set; ai commands will not work (GOOGLE_API_KEY also accepted)",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_passed_requires_every_check() {
        let results = vec![
            CheckResult::pass("a", None),
            CheckResult::pass("b", Some("v1".into())),
        ];
        assert!(all_passed(&results));

        let mixed = vec![CheckResult::pass("a", None), CheckResult::fail("b", "missing")];
        assert!(!all_passed(&mixed));
        assert!(all_passed(&[]));
    }

    #[tokio::test]
    async fn missing_tool_reports_failure() {
        let result = check_tool("bogus", "skillkit-definitely-not-a-tool", "--version").await;
        assert!(!result.passed);
        assert!(result.details.is_some());
    }

    #[tokio::test]
    async fn present_tool_reports_version_detail() {
        // `sh` exists on any unix test host but has no --version that exits
        // zero everywhere, so probe with ls which is universally present.
        let result = check_tool("ls", "ls", "--help").await;
        assert!(result.passed);
    }
}
