//! External process execution with timeout and output capture.
//!
//! Every skill that shells out (ffmpeg, ImageMagick, ripgrep, git, Chrome)
//! goes through [`run`].  Commands are spawned directly from an argument
//! vector, never through a shell.  Stdout and stderr are each truncated to
//! [`MAX_OUTPUT_BYTES`] (100 KB) to prevent memory exhaustion from runaway
//! commands.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, SkillError};

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Maximum captured size in bytes per stream (100 KB).
const MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a command to completion, capturing stdout and stderr.
///
/// The first element of `argv` is the program; the rest are its arguments.
/// On timeout the child is killed via `kill_on_drop` and a
/// [`SkillError::Timeout`] is returned.
pub async fn run(argv: &[String], timeout_secs: u64) -> Result<CommandOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| SkillError::InvalidInput {
        skill: "exec".into(),
        reason: "empty command line".into(),
    })?;

    debug!(program = %program, args = ?args, "spawning command");

    let child = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SkillError::ToolMissing {
                tool: program.clone(),
                hint: "install it and ensure it is on PATH".into(),
            },
            _ => SkillError::Io(e),
        })?;

    // `wait_with_output` takes ownership, so on timeout the child is dropped
    // and killed via `kill_on_drop(true)`.
    let result = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            let (stdout, stdout_truncated) = truncate_output(&output.stdout);
            let (stderr, stderr_truncated) = truncate_output(&output.stderr);
            debug!(program = %program, exit_code = exit_code, "command completed");
            Ok(CommandOutput {
                stdout,
                stderr,
                exit_code,
                stdout_truncated,
                stderr_truncated,
            })
        }
        Ok(Err(e)) => Err(SkillError::Io(e)),
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout_secs, "command timed out");
            Err(SkillError::Timeout {
                seconds: timeout_secs,
                reason: format!("`{program}` exceeded time limit"),
            })
        }
    }
}

/// Run a command and map a non-zero exit into [`SkillError::CommandFailed`].
pub async fn run_checked(argv: &[String], timeout_secs: u64) -> Result<CommandOutput> {
    let output = run(argv, timeout_secs).await?;
    if !output.success() {
        return Err(SkillError::CommandFailed {
            program: argv[0].clone(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// Check whether an external tool is available by invoking its version flag.
pub async fn check_command(program: &str, version_flag: &str) -> bool {
    tokio::process::Command::new(program)
        .arg(version_flag)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Render an argument vector as a shell-like string for dry-run display.
///
/// Arguments containing whitespace are quoted.  This is display-only; the
/// real invocation never passes through a shell.
pub fn render_command(argv: &[String]) -> String {
    argv.iter()
        .map(|a| {
            if a.is_empty() || a.chars().any(char::is_whitespace) {
                format!("'{a}'")
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate raw command output to [`MAX_OUTPUT_BYTES`], converting to a
/// lossy UTF-8 string.  Returns `(output_string, was_truncated)`.
fn truncate_output(raw: &[u8]) -> (String, bool) {
    if raw.len() <= MAX_OUTPUT_BYTES {
        (String::from_utf8_lossy(raw).into_owned(), false)
    } else {
        let truncated = &raw[..MAX_OUTPUT_BYTES];
        let mut s = String::from_utf8_lossy(truncated).into_owned();
        s.push_str("\n... [output truncated at 100 KB]");
        (s, true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let out = run(&argv(&["echo", "hello"]), 10)
            .await
            .expect("echo should run");
        assert_eq!(out.exit_code, 0);
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert!(!out.stdout_truncated);
    }

    #[tokio::test]
    async fn run_rejects_empty_command() {
        let result = run(&[], 10).await;
        assert!(matches!(result, Err(SkillError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn run_missing_program_is_tool_missing() {
        let result = run(&argv(&["definitely-not-a-real-binary-xyz"]), 10).await;
        assert!(matches!(result, Err(SkillError::ToolMissing { .. })));
    }

    #[tokio::test]
    async fn run_checked_surfaces_nonzero_exit() {
        let result = run_checked(&argv(&["false"]), 10).await;
        match result {
            Err(SkillError::CommandFailed { exit_code, .. }) => assert_ne!(exit_code, 0),
            other => panic!("expected CommandFailed, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_command_true_for_present_tool() {
        assert!(check_command("true", "--version").await || cfg!(not(unix)));
    }

    #[tokio::test]
    async fn check_command_false_for_missing_tool() {
        assert!(!check_command("definitely-not-a-real-binary-xyz", "--version").await);
    }

    #[test]
    fn render_command_quotes_whitespace() {
        let rendered = render_command(&argv(&["magick", "my file.png", "-strip", "out.png"]));
        assert_eq!(rendered, "magick 'my file.png' -strip out.png");
    }

    #[test]
    fn truncate_output_short_input_not_truncated() {
        let (s, truncated) = truncate_output(b"hello world");
        assert_eq!(s, "hello world");
        assert!(!truncated);
    }

    #[test]
    fn truncate_output_large_input_is_truncated() {
        let data = vec![b'x'; MAX_OUTPUT_BYTES + 1000];
        let (s, truncated) = truncate_output(&data);
        assert!(truncated);
        assert!(s.contains("[output truncated at 100 KB]"));
    }
}
