//! `skillkit media` subcommand handlers.

use anyhow::{Result, bail};

use skillkit_skills::media::convert::{ConvertOptions, convert_batch};
use skillkit_skills::media::optimize::{
    OptimizeOptions, PrepareOptions, optimize_video, prepare_for_upload, split_video,
};
use skillkit_skills::media::resize::{ResizeOptions, resize_batch};
use skillkit_skills::media::QualityPreset;

use crate::cli::MediaAction;

pub async fn run(action: MediaAction) -> Result<()> {
    match action {
        MediaAction::Convert {
            inputs,
            format,
            output_dir,
            preset,
            dry_run,
        } => {
            let preset: QualityPreset = preset
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let opts = ConvertOptions { preset, dry_run };
            let report = convert_batch(&inputs, &output_dir, &format, &opts).await?;
            println!(
                "Done: {} succeeded, {} failed.",
                report.succeeded, report.failed
            );
            if report.failed > 0 {
                bail!("{} conversion(s) failed", report.failed);
            }
            Ok(())
        }

        MediaAction::Resize {
            inputs,
            width,
            height,
            strategy,
            quality,
            format,
            watermark,
            recursive,
            output_dir,
            dry_run,
        } => {
            let strategy = strategy
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let opts = ResizeOptions {
                width,
                height,
                strategy,
                quality,
                format,
                watermark,
                recursive,
                dry_run,
            };
            let report = resize_batch(&inputs, &output_dir, &opts).await?;
            println!(
                "Done: {} succeeded, {} failed.",
                report.succeeded, report.failed
            );
            if report.failed > 0 {
                bail!("{} resize(s) failed", report.failed);
            }
            Ok(())
        }

        MediaAction::Optimize {
            input,
            output,
            max_width,
            max_height,
            fps,
            crf,
            audio_bitrate,
            encoder_preset,
            two_pass,
            verbose,
            dry_run,
        } => {
            let opts = OptimizeOptions {
                max_width,
                max_height,
                target_fps: fps,
                crf,
                audio_bitrate,
                encoder_preset,
                two_pass,
                verbose,
                dry_run,
            };
            optimize_video(&input, &output, &opts).await?;
            Ok(())
        }

        MediaAction::Prepare {
            input,
            output,
            target_size,
            max_duration,
            quality,
            resolution,
            audio_bitrate,
            verbose,
            dry_run,
        } => {
            let opts = PrepareOptions {
                target_size_mb: target_size,
                max_duration,
                quality,
                resolution,
                audio_bitrate,
                verbose,
                dry_run,
            };
            prepare_for_upload(&input, &output, &opts).await?;
            Ok(())
        }

        MediaAction::Split {
            input,
            output_dir,
            chunk_secs,
            verbose,
        } => {
            let chunks = split_video(&input, &output_dir, chunk_secs, verbose).await?;
            if chunks.len() == 1 && chunks[0] == input {
                println!("Video fits in a single chunk; no split needed.");
            } else {
                println!("Wrote {} chunks:", chunks.len());
                for chunk in &chunks {
                    println!("  {}", chunk.display());
                }
            }
            Ok(())
        }
    }
}
