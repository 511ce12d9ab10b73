//! Video size optimization and upload preparation.
//!
//! Two distinct consumers share this module: `media optimize` shrinks a
//! video for delivery (CRF or two-pass bitrate encoding), and `media
//! prepare` produces files small enough for the multimodal API's inline
//! limit (capped resolution, mono low-rate audio, qscale images).  Long
//! recordings can be split into stream-copied chunks.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Result, SkillError};
use crate::exec;
use crate::media::probe::{self, MediaInfo};

/// Seconds allowed for a single encode.
const ENCODE_TIMEOUT_SECS: u64 = 7200;

/// Assumed bitrate reduction for two-pass encoding.
const TWO_PASS_BITRATE_FACTOR: f64 = 0.7;

/// Widest output produced by upload preparation.
const PREPARE_MAX_WIDTH: u32 = 1920;

/// Floor for computed video bitrates (bits per second).
const MIN_VIDEO_BITRATE: u64 = 500_000;

/// Audio bitrate assumed when budgeting a target file size (bits per second).
const BUDGET_AUDIO_BITRATE: u64 = 128_000;

/// Options for `media optimize`.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Cap the output frame rate; ignored when at or above the source rate.
    pub target_fps: Option<f64>,
    pub crf: u32,
    pub audio_bitrate: String,
    pub encoder_preset: String,
    pub two_pass: bool,
    pub verbose: bool,
    pub dry_run: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            target_fps: None,
            crf: 23,
            audio_bitrate: "128k".into(),
            encoder_preset: "medium".into(),
            two_pass: false,
            verbose: false,
            dry_run: false,
        }
    }
}

/// Fit `(width, height)` inside the optional max bounds, preserving aspect
/// ratio and rounding both dimensions down to even numbers (libx264 rejects
/// odd dimensions).
pub fn target_resolution(
    width: u32,
    height: u32,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> (u32, u32) {
    if max_width.is_none() && max_height.is_none() {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    let (mut new_w, mut new_h) = (width, height);

    match (max_width, max_height) {
        (Some(mw), Some(mh)) => {
            if width > mw || height > mh {
                if width as f64 / mw as f64 > height as f64 / mh as f64 {
                    new_w = mw;
                    new_h = (mw as f64 / aspect).round() as u32;
                } else {
                    new_h = mh;
                    new_w = (mh as f64 * aspect).round() as u32;
                }
            }
        }
        (Some(mw), None) => {
            new_w = width.min(mw);
            new_h = (new_w as f64 / aspect).round() as u32;
        }
        (None, Some(mh)) => {
            new_h = height.min(mh);
            new_w = (new_h as f64 * aspect).round() as u32;
        }
        (None, None) => unreachable!(),
    }

    (new_w - new_w % 2, new_h - new_h % 2)
}

/// Parse a `WIDTHxHEIGHT` resolution argument such as `1280x720`.
pub fn parse_resolution(raw: &str) -> Result<(u32, u32)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+)$").expect("static regex"));

    let caps = re.captures(raw).ok_or_else(|| SkillError::InvalidInput {
        skill: "media_optimize".into(),
        reason: format!("invalid resolution `{raw}` (expected WIDTHxHEIGHT, e.g. 1280x720)"),
    })?;
    // Captures are all-digit by construction.
    let w: u32 = caps[1].parse().map_err(|_| SkillError::InvalidInput {
        skill: "media_optimize".into(),
        reason: format!("width out of range in `{raw}`"),
    })?;
    let h: u32 = caps[2].parse().map_err(|_| SkillError::InvalidInput {
        skill: "media_optimize".into(),
        reason: format!("height out of range in `{raw}`"),
    })?;
    Ok((w, h))
}

/// Optimize a video with CRF or two-pass bitrate encoding.
pub async fn optimize_video(input: &Path, output: &Path, opts: &OptimizeOptions) -> Result<()> {
    let info = probe::probe(input).await?;

    if opts.verbose {
        println!("\nInput video info:");
        println!("  Resolution: {}x{}", info.width, info.height);
        println!("  FPS: {:.2}", info.fps);
        println!("  Bitrate: {} kbps", info.bitrate / 1000);
        println!("  Size: {:.2} MB", info.size as f64 / (1024.0 * 1024.0));
    }

    let (target_w, target_h) =
        target_resolution(info.width, info.height, opts.max_width, opts.max_height);

    let mut base = vec![
        "ffmpeg".to_string(),
        "-i".to_string(),
        input.display().to_string(),
    ];

    if target_w != info.width || target_h != info.height {
        base.push("-vf".into());
        base.push(format!("scale={target_w}:{target_h}"));
    }

    if let Some(fps) = opts.target_fps {
        if fps < info.fps {
            base.push("-r".into());
            base.push(fps.to_string());
        }
    }

    if opts.two_pass {
        let target_bitrate = ((info.bitrate as f64) * TWO_PASS_BITRATE_FACTOR) as u64;

        let mut pass1 = base.clone();
        pass1.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            opts.encoder_preset.clone(),
            "-b:v".into(),
            target_bitrate.to_string(),
            "-pass".into(),
            "1".into(),
            "-an".into(),
            "-f".into(),
            "null".into(),
            null_sink().into(),
        ]);

        if opts.verbose || opts.dry_run {
            println!("Pass 1...");
        }
        if opts.dry_run {
            println!("{}", exec::render_command(&pass1));
        } else {
            let pass1_result = exec::run_checked(&pass1, ENCODE_TIMEOUT_SECS).await;
            if pass1_result.is_err() {
                cleanup_pass_logs();
                pass1_result?;
            }
        }

        base.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            opts.encoder_preset.clone(),
            "-b:v".into(),
            target_bitrate.to_string(),
            "-pass".into(),
            "2".into(),
        ]);
    } else {
        base.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            opts.encoder_preset.clone(),
            "-crf".into(),
            opts.crf.to_string(),
        ]);
    }

    base.extend([
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        opts.audio_bitrate.clone(),
        "-movflags".into(),
        "+faststart".into(),
        "-y".into(),
        output.display().to_string(),
    ]);

    if opts.dry_run {
        println!("{}", exec::render_command(&base));
        return Ok(());
    }

    let encode_result = exec::run_checked(&base, ENCODE_TIMEOUT_SECS).await;
    if opts.two_pass {
        cleanup_pass_logs();
    }
    encode_result?;

    if opts.verbose {
        if let Ok(out_info) = probe::probe(output).await {
            println!("\nOutput video info:");
            println!("  Resolution: {}x{}", out_info.width, out_info.height);
            println!("  Size: {:.2} MB", out_info.size as f64 / (1024.0 * 1024.0));
            if info.size > 0 {
                let reduction = (1.0 - out_info.size as f64 / info.size as f64) * 100.0;
                println!("  Size reduction: {reduction:.1}%");
            }
        }
    }

    info!(input = %input.display(), output = %output.display(), "optimized video");
    Ok(())
}

/// Options for upload preparation (`media prepare`).
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Target output size in megabytes; drives bitrate budgeting for video.
    pub target_size_mb: Option<u64>,
    /// Drop content past this many seconds of video.
    pub max_duration: Option<f64>,
    /// Image/video quality, 0-100.
    pub quality: u32,
    /// Explicit output resolution for video, `WIDTHxHEIGHT`.
    pub resolution: Option<String>,
    /// Audio bitrate for audio inputs (e.g. `64k`).
    pub audio_bitrate: String,
    pub verbose: bool,
    pub dry_run: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            target_size_mb: None,
            max_duration: None,
            quality: 85,
            resolution: None,
            audio_bitrate: "64k".into(),
            verbose: false,
            dry_run: false,
        }
    }
}

/// Build the ffmpeg command that shrinks a video for inline API upload.
pub fn build_prepare_video_command(
    input: &Path,
    output: &Path,
    info: &MediaInfo,
    opts: &PrepareOptions,
) -> Result<Vec<String>> {
    let mut cmd = vec![
        "ffmpeg".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-y".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        crf_for_quality(opts.quality).to_string(),
    ];

    if let Some(res) = &opts.resolution {
        let (w, h) = parse_resolution(res)?;
        cmd.push("-vf".into());
        cmd.push(format!("scale={w}:{h}"));
    } else if info.width > PREPARE_MAX_WIDTH {
        cmd.push("-vf".into());
        cmd.push(format!("scale={PREPARE_MAX_WIDTH}:-2"));
    }

    cmd.extend([
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-ac".into(),
        "2".into(),
    ]);

    if let Some(max) = opts.max_duration {
        if info.duration > max {
            cmd.push("-t".into());
            cmd.push(max.to_string());
        }
    }

    if let Some(target_mb) = opts.target_size_mb {
        let duration = opts
            .max_duration
            .map_or(info.duration, |m| info.duration.min(m));
        if duration > 0.0 {
            let target_bits = target_mb * 8 * 1024 * 1024;
            let total_bitrate = (target_bits as f64 / duration) as u64;
            let video_bitrate = total_bitrate
                .saturating_sub(BUDGET_AUDIO_BITRATE)
                .max(MIN_VIDEO_BITRATE);
            cmd.push("-b:v".into());
            cmd.push(video_bitrate.to_string());
        }
    }

    cmd.push(output.display().to_string());
    Ok(cmd)
}

/// Build the ffmpeg command that downmixes audio for API upload: mono AAC at
/// a telephony-grade sample rate.
pub fn build_prepare_audio_command(
    input: &Path,
    output: &Path,
    opts: &PrepareOptions,
) -> Vec<String> {
    vec![
        "ffmpeg".into(),
        "-i".into(),
        input.display().to_string(),
        "-y".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        opts.audio_bitrate.clone(),
        "-ar".into(),
        "16000".into(),
        "-ac".into(),
        "1".into(),
        output.display().to_string(),
    ]
}

/// Build the ffmpeg command that scales and recompresses an image.
pub fn build_prepare_image_command(
    input: &Path,
    output: &Path,
    max_width: u32,
    quality: u32,
) -> Vec<String> {
    vec![
        "ffmpeg".into(),
        "-i".into(),
        input.display().to_string(),
        "-y".into(),
        "-vf".into(),
        format!("scale='min({max_width},iw)':-1"),
        "-q:v".into(),
        qscale_for_quality(quality).to_string(),
        output.display().to_string(),
    ]
}

/// Prepare a single media file for API upload, dispatching on its extension.
pub async fn prepare_for_upload(input: &Path, output: &Path, opts: &PrepareOptions) -> Result<()> {
    let cmd = match crate::media::MediaKind::from_path(input) {
        crate::media::MediaKind::Video => {
            let info = probe::probe(input).await?;
            if opts.verbose {
                println!(
                    "Input: {} ({:.2} MB, {:.2}s)",
                    input.display(),
                    info.size as f64 / (1024.0 * 1024.0),
                    info.duration
                );
            }
            build_prepare_video_command(input, output, &info, opts)?
        }
        crate::media::MediaKind::Audio => build_prepare_audio_command(input, output, opts),
        crate::media::MediaKind::Image => {
            build_prepare_image_command(input, output, PREPARE_MAX_WIDTH, opts.quality)
        }
        crate::media::MediaKind::Unknown => {
            return Err(SkillError::InvalidInput {
                skill: "media_prepare".into(),
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

    exec::run_checked(&cmd, ENCODE_TIMEOUT_SECS).await?;
    Ok(())
}

/// Split a long video into stream-copied chunks of `chunk_secs` each.
///
/// Returns the chunk paths.  A video shorter than one chunk is returned
/// as-is without re-encoding.
pub async fn split_video(
    input: &Path,
    output_dir: &Path,
    chunk_secs: f64,
    verbose: bool,
) -> Result<Vec<PathBuf>> {
    let info = probe::probe(input).await?;
    let num_chunks = (info.duration / chunk_secs).ceil() as usize;
    if num_chunks <= 1 {
        return Ok(vec![input.to_path_buf()]);
    }

    std::fs::create_dir_all(output_dir)?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("chunk");
    let ext = crate::media::extension_lowercase(input).unwrap_or_else(|| "mp4".into());

    let mut chunks = Vec::new();
    for i in 0..num_chunks {
        let start = i as f64 * chunk_secs;
        let output = output_dir.join(format!("{stem}_chunk_{}.{ext}", i + 1));
        let cmd = vec![
            "ffmpeg".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            start.to_string(),
            "-t".to_string(),
            chunk_secs.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.display().to_string(),
        ];

        if verbose {
            println!("Creating chunk {}/{num_chunks}...", i + 1);
        }

        match exec::run_checked(&cmd, ENCODE_TIMEOUT_SECS).await {
            Ok(_) => chunks.push(output),
            Err(e) => warn!(chunk = i + 1, error = %e, "chunk extraction failed"),
        }
    }

    Ok(chunks)
}

/// Map a 0-100 quality to an x264 CRF (higher quality, lower CRF).
fn crf_for_quality(quality: u32) -> u32 {
    // 100 -> 18, 0 -> 33; clamp into x264's sensible band.
    (33u32.saturating_sub(quality.min(100) * 15 / 100)).clamp(18, 33)
}

/// Map a 0-100 quality to ffmpeg's image qscale (1 best, 31 worst).
fn qscale_for_quality(quality: u32) -> u32 {
    31 - (quality.min(100) * 30 / 100)
}

/// ffmpeg's null output path for pass 1.
fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

/// Remove the `ffmpeg2pass*` log files two-pass encoding leaves behind.
fn cleanup_pass_logs() {
    let Ok(entries) = std::fs::read_dir(".") else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("ffmpeg2pass") && (name.ends_with(".log") || name.ends_with(".mbtree"))
        {
            debug!(file = %name, "removing pass log");
            let _ = std::fs::remove_file(entry.path());
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
    fn target_resolution_unbounded_is_identity() {
        assert_eq!(target_resolution(1920, 1080, None, None), (1920, 1080));
    }

    #[test]
    fn target_resolution_width_cap_preserves_aspect() {
        let (w, h) = target_resolution(1920, 1080, Some(1280), None);
        assert_eq!((w, h), (1280, 720));
    }

    #[test]
    fn target_resolution_rounds_to_even() {
        let (w, h) = target_resolution(1001, 1001, Some(999), None);
        assert_eq!(w % 2, 0);
        assert_eq!(h % 2, 0);
    }

    #[test]
    fn target_resolution_both_bounds_picks_binding_side() {
        // 4000x1000 into 1920x1080: width binds.
        let (w, h) = target_resolution(4000, 1000, Some(1920), Some(1080));
        assert_eq!(w, 1920);
        assert!(h <= 1080);
        // Smaller than bounds: untouched.
        assert_eq!(
            target_resolution(640, 480, Some(1920), Some(1080)),
            (640, 480)
        );
    }

    #[test]
    fn parse_resolution_accepts_wxh() {
        assert_eq!(parse_resolution("1280x720").expect("parse"), (1280, 720));
        assert!(parse_resolution("1280x").is_err());
        assert!(parse_resolution("wide").is_err());
    }

    #[test]
    fn prepare_video_command_budgets_bitrate_for_target_size() {
        let info = MediaInfo {
            duration: 100.0,
            width: 1280,
            height: 720,
            ..MediaInfo::default()
        };
        let opts = PrepareOptions {
            target_size_mb: Some(10),
            ..PrepareOptions::default()
        };
        let cmd = build_prepare_video_command(Path::new("in.mp4"), Path::new("out.mp4"), &info, &opts)
            .expect("should build");

        let bv_pos = cmd.iter().position(|a| a == "-b:v").expect("has -b:v");
        let bitrate: u64 = cmd[bv_pos + 1].parse().expect("numeric bitrate");
        // 10 MB over 100 s minus audio budget.
        let expected = (10u64 * 8 * 1024 * 1024) / 100 - BUDGET_AUDIO_BITRATE;
        assert_eq!(bitrate, expected);
    }

    #[test]
    fn prepare_video_command_caps_wide_sources() {
        let info = MediaInfo {
            duration: 10.0,
            width: 3840,
            height: 2160,
            ..MediaInfo::default()
        };
        let cmd = build_prepare_video_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &info,
            &PrepareOptions::default(),
        )
        .expect("should build");
        assert!(cmd.contains(&"scale=1920:-2".to_string()));
    }

    #[test]
    fn prepare_video_command_enforces_bitrate_floor() {
        let info = MediaInfo {
            duration: 10_000.0,
            width: 1280,
            height: 720,
            ..MediaInfo::default()
        };
        let opts = PrepareOptions {
            target_size_mb: Some(1),
            ..PrepareOptions::default()
        };
        let cmd = build_prepare_video_command(Path::new("in.mp4"), Path::new("out.mp4"), &info, &opts)
            .expect("should build");
        let bv_pos = cmd.iter().position(|a| a == "-b:v").expect("has -b:v");
        let bitrate: u64 = cmd[bv_pos + 1].parse().expect("numeric bitrate");
        assert_eq!(bitrate, MIN_VIDEO_BITRATE);
    }

    #[test]
    fn prepare_audio_command_is_mono_16k() {
        let cmd = build_prepare_audio_command(
            Path::new("in.mp3"),
            Path::new("out.m4a"),
            &PrepareOptions::default(),
        );
        assert!(cmd.windows(2).any(|w| w[0] == "-ar" && w[1] == "16000"));
        assert!(cmd.windows(2).any(|w| w[0] == "-ac" && w[1] == "1"));
    }

    #[test]
    fn prepare_image_command_maps_quality_to_qscale() {
        let cmd = build_prepare_image_command(Path::new("in.png"), Path::new("out.jpg"), 1920, 85);
        // 85 -> 31 - 25 = 6
        assert!(cmd.windows(2).any(|w| w[0] == "-q:v" && w[1] == "6"));
    }

    #[test]
    fn quality_mappings_stay_in_range() {
        for q in [0, 1, 50, 85, 100] {
            let crf = crf_for_quality(q);
            assert!((18..=33).contains(&crf), "crf {crf} for quality {q}");
            let qs = qscale_for_quality(q);
            assert!((1..=31).contains(&qs), "qscale {qs} for quality {q}");
        }
    }
}
