//! Media processing skills backed by ffmpeg and ImageMagick.
//!
//! Submodules build argument vectors for the external tools and run them via
//! [`crate::exec`].  Nothing here re-implements codec logic; the value is in
//! command construction, probing, and batch orchestration.

pub mod convert;
pub mod optimize;
pub mod probe;
pub mod resize;

use std::path::Path;

/// Video container extensions handled by the convert skill.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v"];

/// Audio extensions handled by the convert skill.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "m4a", "opus", "flac", "wav", "ogg"];

/// Image extensions handled by the convert and resize skills.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif"];

/// Broad media classification derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Unknown,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = extension_lowercase(path) else {
            return MediaKind::Unknown;
        };
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else {
            MediaKind::Unknown
        }
    }
}

/// Whether a path has a recognised image extension.
pub fn is_image(path: &Path) -> bool {
    MediaKind::from_path(path) == MediaKind::Image
}

/// Lower-cased extension of a path, without the leading dot.
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Quality presets shared by the conversion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPreset {
    /// Balanced output for web delivery.
    Web,
    /// Higher quality, slower encode, for archival copies.
    Archive,
    /// Smaller output tuned for mobile bandwidth.
    Mobile,
}

/// Concrete encoder parameters behind a [`QualityPreset`].
#[derive(Debug, Clone)]
pub struct PresetParams {
    pub video_crf: u32,
    pub video_preset: &'static str,
    pub audio_bitrate: &'static str,
    pub image_quality: u32,
}

impl QualityPreset {
    /// Encoder parameters for this preset.
    pub fn params(self) -> PresetParams {
        match self {
            QualityPreset::Web => PresetParams {
                video_crf: 23,
                video_preset: "medium",
                audio_bitrate: "128k",
                image_quality: 85,
            },
            QualityPreset::Archive => PresetParams {
                video_crf: 18,
                video_preset: "slow",
                audio_bitrate: "192k",
                image_quality: 95,
            },
            QualityPreset::Mobile => PresetParams {
                video_crf: 26,
                video_preset: "fast",
                audio_bitrate: "96k",
                image_quality: 80,
            },
        }
    }
}

impl std::str::FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "web" => Ok(QualityPreset::Web),
            "archive" => Ok(QualityPreset::Archive),
            "mobile" => Ok(QualityPreset::Mobile),
            other => Err(format!("unknown preset `{other}` (web, archive, mobile)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_classifies_by_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("a.FLAC")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("a.JPeG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("a.txt")), MediaKind::Unknown);
        assert_eq!(MediaKind::from_path(Path::new("noext")), MediaKind::Unknown);
    }

    #[test]
    fn preset_params_match_tier() {
        assert_eq!(QualityPreset::Web.params().video_crf, 23);
        assert_eq!(QualityPreset::Archive.params().video_preset, "slow");
        assert_eq!(QualityPreset::Mobile.params().audio_bitrate, "96k");
    }

    #[test]
    fn preset_parses_from_str() {
        assert_eq!(
            "archive".parse::<QualityPreset>().expect("parse"),
            QualityPreset::Archive
        );
        assert!("ultra".parse::<QualityPreset>().is_err());
    }
}
