//! Skill implementations for the skillkit CLI.
//!
//! Each module wraps an external tool or API behind a typed interface:
//! ffmpeg/ffprobe and ImageMagick for media, Chrome over the DevTools
//! protocol for browser automation, the Gemini API for multimodal
//! processing, and ripgrep/git for project search. The [`error`] module
//! defines the shared error type; [`exec`] is the subprocess layer
//! everything shells through.

pub mod analysis;
pub mod browser;
pub mod config;
pub mod doctor;
pub mod error;
pub mod exec;
pub mod manifest;
pub mod media;
pub mod multimodal;
pub mod search;
pub mod telemetry;
pub mod thought;

pub use error::{Result, SkillError};
pub use exec::CommandOutput;
