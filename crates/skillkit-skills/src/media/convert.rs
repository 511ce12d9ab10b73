//! Unified media conversion for video, audio, and images.
//!
//! Builds ffmpeg command lines for video and audio targets and ImageMagick
//! command lines for images, then runs them sequentially.  Batch mode
//! converts many inputs into an output directory, counting successes and
//! failures instead of aborting on the first bad file.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, SkillError};
use crate::exec;
use crate::media::{MediaKind, QualityPreset, extension_lowercase};

/// Seconds allowed for a single conversion.
const CONVERT_TIMEOUT_SECS: u64 = 3600;

/// Options shared by single-file and batch conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub preset: QualityPreset,
    /// Print the command instead of executing it.
    pub dry_run: bool,
}

/// Outcome of a batch conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Map an audio output extension to its ffmpeg encoder.
fn audio_codec_for(ext: &str) -> &'static str {
    match ext {
        "mp3" => "libmp3lame",
        "aac" | "m4a" => "aac",
        "opus" => "libopus",
        "flac" => "flac",
        "wav" => "pcm_s16le",
        "ogg" => "libvorbis",
        _ => "aac",
    }
}

/// Lossless codecs where a bitrate flag would be meaningless.
fn is_lossless(codec: &str) -> bool {
    matches!(codec, "flac" | "pcm_s16le")
}

/// Build the ffmpeg command for a video conversion.
pub fn build_video_command(input: &Path, output: &Path, preset: QualityPreset) -> Vec<String> {
    let q = preset.params();
    vec![
        "ffmpeg".into(),
        "-i".into(),
        input.display().to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        q.video_preset.into(),
        "-crf".into(),
        q.video_crf.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        q.audio_bitrate.into(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
        output.display().to_string(),
    ]
}

/// Build the ffmpeg command for an audio conversion.  The encoder is chosen
/// from the output extension; lossless targets omit the bitrate flag.
pub fn build_audio_command(input: &Path, output: &Path, preset: QualityPreset) -> Vec<String> {
    let q = preset.params();
    let ext = extension_lowercase(output).unwrap_or_default();
    let codec = audio_codec_for(&ext);

    let mut cmd = vec![
        "ffmpeg".into(),
        "-i".into(),
        input.display().to_string(),
        "-c:a".into(),
        codec.into(),
    ];
    if !is_lossless(codec) {
        cmd.push("-b:a".into());
        cmd.push(q.audio_bitrate.into());
    }
    cmd.push("-y".into());
    cmd.push(output.display().to_string());
    cmd
}

/// Build the ImageMagick command for an image conversion.
pub fn build_image_command(input: &Path, output: &Path, preset: QualityPreset) -> Vec<String> {
    let q = preset.params();
    vec![
        "magick".into(),
        input.display().to_string(),
        "-quality".into(),
        q.image_quality.to_string(),
        "-strip".into(),
        output.display().to_string(),
    ]
}

/// Convert a single file, choosing the tool from the input's media kind.
pub async fn convert_file(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<()> {
    let cmd = match MediaKind::from_path(input) {
        MediaKind::Video => build_video_command(input, output, opts.preset),
        MediaKind::Audio => build_audio_command(input, output, opts.preset),
        MediaKind::Image => build_image_command(input, output, opts.preset),
        MediaKind::Unknown => {
            return Err(SkillError::InvalidInput {
                skill: "media_convert".into(),
                reason: format!("unsupported format for `{}`", input.display()),
            });
        }
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if opts.dry_run {
        println!("{}", exec::render_command(&cmd));
        return Ok(());
    }

    exec::run_checked(&cmd, CONVERT_TIMEOUT_SECS).await?;
    info!(input = %input.display(), output = %output.display(), "converted");
    Ok(())
}

/// Convert many inputs into `output_dir`, renaming each to `format`.
///
/// Inputs that are missing or fail to convert are counted and skipped; the
/// loop is strictly sequential.
pub async fn convert_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    format: &str,
    opts: &ConvertOptions,
) -> Result<BatchReport> {
    let format = format.trim_start_matches('.');
    let mut report = BatchReport::default();

    for input in inputs {
        if !input.exists() {
            warn!(input = %input.display(), "file not found");
            report.failed += 1;
            continue;
        }

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let output = output_dir.join(format!("{stem}.{format}"));

        println!(
            "Converting {} -> {}",
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        match convert_file(input, &output, opts).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "conversion failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_command_uses_preset_parameters() {
        let cmd = build_video_command(
            Path::new("in.mov"),
            Path::new("out.mp4"),
            QualityPreset::Archive,
        );
        assert_eq!(cmd[0], "ffmpeg");
        assert!(cmd.windows(2).any(|w| w[0] == "-crf" && w[1] == "18"));
        assert!(cmd.windows(2).any(|w| w[0] == "-preset" && w[1] == "slow"));
        assert!(cmd.contains(&"+faststart".to_string()));
        assert_eq!(cmd.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn audio_command_picks_codec_by_extension() {
        let cmd = build_audio_command(
            Path::new("in.wav"),
            Path::new("out.mp3"),
            QualityPreset::Web,
        );
        assert!(cmd.windows(2).any(|w| w[0] == "-c:a" && w[1] == "libmp3lame"));
        assert!(cmd.windows(2).any(|w| w[0] == "-b:a" && w[1] == "128k"));
    }

    #[test]
    fn audio_command_skips_bitrate_for_lossless() {
        let cmd = build_audio_command(
            Path::new("in.mp3"),
            Path::new("out.flac"),
            QualityPreset::Web,
        );
        assert!(cmd.windows(2).any(|w| w[0] == "-c:a" && w[1] == "flac"));
        assert!(!cmd.contains(&"-b:a".to_string()));
    }

    #[test]
    fn audio_command_defaults_to_aac_for_unknown_extension() {
        let cmd = build_audio_command(
            Path::new("in.wav"),
            Path::new("out.xyz"),
            QualityPreset::Web,
        );
        assert!(cmd.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
    }

    #[test]
    fn image_command_sets_quality_and_strip() {
        let cmd = build_image_command(
            Path::new("in.png"),
            Path::new("out.jpg"),
            QualityPreset::Mobile,
        );
        assert_eq!(cmd[0], "magick");
        assert!(cmd.windows(2).any(|w| w[0] == "-quality" && w[1] == "80"));
        assert!(cmd.contains(&"-strip".to_string()));
    }

    #[tokio::test]
    async fn convert_file_rejects_unknown_format() {
        let opts = ConvertOptions {
            preset: QualityPreset::Web,
            dry_run: true,
        };
        let result = convert_file(Path::new("notes.txt"), Path::new("out.mp4"), &opts).await;
        assert!(matches!(result, Err(SkillError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn convert_batch_counts_missing_files_as_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let opts = ConvertOptions {
            preset: QualityPreset::Web,
            dry_run: true,
        };
        let inputs = vec![dir.path().join("missing.mp4")];
        let report = convert_batch(&inputs, dir.path(), "webm", &opts)
            .await
            .expect("batch should not error");
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn convert_batch_dry_run_succeeds_for_existing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"stub").expect("write");

        let opts = ConvertOptions {
            preset: QualityPreset::Web,
            dry_run: true,
        };
        let report = convert_batch(&[input], dir.path(), ".webm", &opts)
            .await
            .expect("batch should not error");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
    }
}
