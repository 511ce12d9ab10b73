//! Skill error types.
//!
//! All skill subsystems surface errors through [`SkillError`].  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.

/// Unified error type for skillkit skills.
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// An I/O operation failed within the skill.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A required external tool is missing from the system.
    #[error("required tool not found: `{tool}` ({hint})")]
    ToolMissing { tool: String, hint: String },

    /// The inputs supplied to a skill are invalid.
    #[error("invalid input for `{skill}`: {reason}")]
    InvalidInput { skill: String, reason: String },

    /// An external process exited with a non-zero status.
    #[error("`{program}` failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    /// A skill operation failed for a reason other than a child process.
    #[error("execution failed for `{skill}`: {reason}")]
    ExecutionFailed { skill: String, reason: String },

    /// An HTTP request to an external API failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API returned an error payload.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation exceeded its time limit.
    #[error("timeout after {seconds}s: {reason}")]
    Timeout { seconds: u64, reason: String },

    /// Configuration error (missing or malformed settings).
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the skills crate.
pub type Result<T> = std::result::Result<T, SkillError>;
