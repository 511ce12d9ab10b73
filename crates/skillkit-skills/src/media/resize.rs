//! Batch image resizing with multiple geometry strategies.
//!
//! Wraps ImageMagick's `-resize`/`-extent` flags.  The strategies map to the
//! usual CSS object-fit vocabulary: `fit` preserves aspect within the box,
//! `fill` crops to fill it exactly, `cover` scales to cover without crop,
//! `exact` distorts, and `thumbnail` produces a square crop.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, SkillError};
use crate::exec;
use crate::media::{convert::BatchReport, extension_lowercase, is_image};

/// Seconds allowed for a single resize.
const RESIZE_TIMEOUT_SECS: u64 = 300;

/// Default square size for the thumbnail strategy when no dimension is given.
const DEFAULT_THUMBNAIL_SIZE: u32 = 200;

/// How an image should be fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStrategy {
    Fit,
    Fill,
    Cover,
    Exact,
    Thumbnail,
}

impl std::str::FromStr for ResizeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fit" => Ok(ResizeStrategy::Fit),
            "fill" => Ok(ResizeStrategy::Fill),
            "cover" => Ok(ResizeStrategy::Cover),
            "exact" => Ok(ResizeStrategy::Exact),
            "thumbnail" => Ok(ResizeStrategy::Thumbnail),
            other => Err(format!(
                "unknown strategy `{other}` (fit, fill, cover, exact, thumbnail)"
            )),
        }
    }
}

/// Options for one resize run.
#[derive(Debug, Clone)]
pub struct ResizeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub strategy: ResizeStrategy,
    /// JPEG/WebP quality, 0-100.
    pub quality: u32,
    /// Output extension override (e.g. `webp`); input extension otherwise.
    pub format: Option<String>,
    /// Watermark image composited bottom-right.
    pub watermark: Option<PathBuf>,
    /// Descend into subdirectories when an input is a directory.
    pub recursive: bool,
    pub dry_run: bool,
}

/// Collect image files from a mix of file and directory inputs.
///
/// Inaccessible inputs are skipped with a warning.  Directory scans are
/// flat unless `recursive` is set.
pub fn gather_images(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut images = Vec::new();
    for input in inputs {
        match std::fs::metadata(input) {
            Ok(meta) if meta.is_file() => {
                if is_image(input) {
                    images.push(input.clone());
                }
            }
            Ok(meta) if meta.is_dir() => {
                scan_dir(input, recursive, &mut images);
            }
            _ => warn!(input = %input.display(), "could not access input"),
        }
    }
    images
}

fn scan_dir(dir: &Path, recursive: bool, images: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            warn!(dir = %dir.display(), "could not read directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            if is_image(&path) {
                images.push(path);
            }
        } else if recursive && path.is_dir() {
            scan_dir(&path, true, images);
        }
    }
}

/// Build the ImageMagick command for one image.
pub fn build_resize_command(
    input: &Path,
    output: &Path,
    opts: &ResizeOptions,
) -> Result<Vec<String>> {
    let mut cmd = vec!["magick".to_string(), input.display().to_string()];
    let (w, h) = (opts.width, opts.height);

    let both = |skill: &str| -> Result<(u32, u32)> {
        match (w, h) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => Err(SkillError::InvalidInput {
                skill: "media_resize".into(),
                reason: format!("both --width and --height are required for `{skill}`"),
            }),
        }
    };

    match opts.strategy {
        ResizeStrategy::Fit => {
            let geometry = format!(
                "{}x{}",
                w.map(|v| v.to_string()).unwrap_or_default(),
                h.map(|v| v.to_string()).unwrap_or_default(),
            );
            cmd.extend(["-resize".into(), geometry]);
        }
        ResizeStrategy::Fill => {
            let (w, h) = both("fill")?;
            cmd.extend([
                "-resize".into(),
                format!("{w}x{h}^"),
                "-gravity".into(),
                "center".into(),
                "-extent".into(),
                format!("{w}x{h}"),
            ]);
        }
        ResizeStrategy::Cover => {
            let (w, h) = both("cover")?;
            cmd.extend(["-resize".into(), format!("{w}x{h}^")]);
        }
        ResizeStrategy::Exact => {
            let (w, h) = both("exact")?;
            cmd.extend(["-resize".into(), format!("{w}x{h}!")]);
        }
        ResizeStrategy::Thumbnail => {
            let size = w.or(h).unwrap_or(DEFAULT_THUMBNAIL_SIZE);
            cmd.extend([
                "-resize".into(),
                format!("{size}x{size}^"),
                "-gravity".into(),
                "center".into(),
                "-extent".into(),
                format!("{size}x{size}"),
            ]);
        }
    }

    if let Some(watermark) = &opts.watermark {
        cmd.extend([
            watermark.display().to_string(),
            "-gravity".into(),
            "southeast".into(),
            "-geometry".into(),
            "+10+10".into(),
            "-composite".into(),
        ]);
    }

    cmd.extend([
        "-quality".into(),
        opts.quality.to_string(),
        "-strip".into(),
        output.display().to_string(),
    ]);

    Ok(cmd)
}

/// Resize every gathered image into `output_dir`, sequentially.
pub async fn resize_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    opts: &ResizeOptions,
) -> Result<BatchReport> {
    if opts.width.is_none() && opts.height.is_none() {
        return Err(SkillError::InvalidInput {
            skill: "media_resize".into(),
            reason: "at least one of --width or --height is required".into(),
        });
    }

    let images = gather_images(inputs, opts.recursive);
    if images.is_empty() {
        return Err(SkillError::InvalidInput {
            skill: "media_resize".into(),
            reason: "no images found in the given inputs".into(),
        });
    }

    println!("Found {} images to process.", images.len());

    if !opts.dry_run {
        std::fs::create_dir_all(output_dir)?;
    }

    let mut report = BatchReport::default();
    for input in &images {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let ext = match &opts.format {
            Some(f) => f.trim_start_matches('.').to_string(),
            None => extension_lowercase(input).unwrap_or_else(|| "png".into()),
        };
        let output = output_dir.join(format!("{stem}.{ext}"));

        println!(
            "Processing {} -> {}",
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let outcome = async {
            let cmd = build_resize_command(input, &output, opts)?;
            if opts.dry_run {
                println!("{}", exec::render_command(&cmd));
                return Ok(());
            }
            exec::run_checked(&cmd, RESIZE_TIMEOUT_SECS).await.map(|_| ())
        }
        .await;

        match outcome {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                warn!(input = %input.display(), error = %e, "resize failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
