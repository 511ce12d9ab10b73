//! Project settings for the skillkit bundle.
//!
//! A project that uses skillkit carries a `.skillkit/` directory at its root
//! holding the skill bundle and a `settings.json`.  The settings file may
//! contain `//` and `/* */` comments, which are stripped before parsing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SkillError};

/// Name of the bundle directory at the project root.
pub const BUNDLE_DIR: &str = ".skillkit";

/// Name of the settings file inside the bundle directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Project-level settings loaded from `.skillkit/settings.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Telemetry configuration, if the host agent writes an event log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetrySettings>,
}

/// Telemetry section of the settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Path to the telemetry event log, absolute or relative to the project
    /// root.
    pub outfile: String,
}

/// Resolve the project root directory.
///
/// Resolution order: `SKILLKIT_ROOT`, then `INIT_CWD` (set by package
/// managers when a script runs from a subdirectory), then the current
/// working directory.
pub fn project_root() -> PathBuf {
    if let Ok(root) = std::env::var("SKILLKIT_ROOT") {
        return PathBuf::from(root);
    }
    if let Ok(root) = std::env::var("INIT_CWD") {
        return PathBuf::from(root);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Path to the bundle directory under `root`.
pub fn bundle_dir(root: &Path) -> PathBuf {
    root.join(BUNDLE_DIR)
}

/// Load settings from `.skillkit/settings.json` under `root`.
///
/// Returns `Ok(None)` when the file does not exist; malformed JSON is an
/// error.
pub fn load_settings(root: &Path) -> Result<Option<Settings>> {
    let path = bundle_dir(root).join(SETTINGS_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no settings file");
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path)?;
    let stripped = strip_json_comments(&raw);
    let settings: Settings = serde_json::from_str(&stripped).map_err(|e| {
        SkillError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(Some(settings))
}

/// Resolve the telemetry outfile from settings, made absolute against `root`.
pub fn telemetry_outfile(root: &Path, settings: &Settings) -> Result<PathBuf> {
    let telemetry = settings.telemetry.as_ref().ok_or_else(|| {
        SkillError::Config("telemetry outfile not configured in settings.json".into())
    })?;

    let path = Path::new(&telemetry.outfile);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(root.join(path))
    }
}

/// Strip `//` line comments and `/* */` block comments from JSON text.
///
/// Comment markers inside string literals are preserved.
fn strip_json_comments(input: &str) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
        } else if c == b'"' {
            in_string = true;
            out.push(b'"');
            i += 1;
        } else if c == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }

    // Only whole byte ranges are removed, so the result is still UTF-8.
    String::from_utf8(out)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comments_line_and_block() {
        let input = r#"{
  // line comment
  "telemetry": { /* block */ "outfile": "telemetry.log" }
}"#;
        let stripped = strip_json_comments(input);
        let parsed: serde_json::Value =
            serde_json::from_str(&stripped).expect("should parse after stripping");
        assert_eq!(
            parsed["telemetry"]["outfile"],
            serde_json::json!("telemetry.log")
        );
    }

    #[test]
    fn strip_comments_preserves_slashes_in_strings() {
        let input = r#"{"url": "https://example.com/a//b"}"#;
        let stripped = strip_json_comments(input);
        assert_eq!(stripped, input);
    }

    #[test]
    fn load_settings_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(dir.path()).expect("should not error");
        assert!(settings.is_none());
    }

    #[test]
    fn load_settings_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bundle = bundle_dir(dir.path());
        std::fs::create_dir_all(&bundle).expect("mkdir");
        std::fs::write(
            bundle.join(SETTINGS_FILE),
            r#"{ "telemetry": { "outfile": "logs/agent.log" } }"#,
        )
        .expect("write");

        let settings = load_settings(dir.path())
            .expect("should load")
            .expect("should be present");
        let outfile = telemetry_outfile(dir.path(), &settings).expect("outfile");
        assert_eq!(outfile, dir.path().join("logs/agent.log"));
    }

    #[test]
    fn telemetry_outfile_absolute_path_unchanged() {
        let settings = Settings {
            telemetry: Some(TelemetrySettings {
                outfile: "/var/log/agent.log".into(),
            }),
        };
        let outfile =
            telemetry_outfile(Path::new("/project"), &settings).expect("outfile");
        assert_eq!(outfile, PathBuf::from("/var/log/agent.log"));
    }

    #[test]
    fn telemetry_outfile_missing_section_is_config_error() {
        let settings = Settings::default();
        let result = telemetry_outfile(Path::new("/project"), &settings);
        assert!(matches!(result, Err(SkillError::Config(_))));
    }
}
