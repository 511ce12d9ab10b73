//! CLI argument definitions for skillkit.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// skillkit -- agent skill toolbox.
#[derive(Parser)]
#[command(
    name = "skillkit",
    version,
    about = "skillkit -- media, browser, and AI skills for agent workflows",
    long_about = "A toolbox of agent skills: media processing via ffmpeg and \
                  ImageMagick, browser automation over the Chrome DevTools \
                  protocol, Gemini multimodal processing, project search, \
                  telemetry filtering, and skill bundle management."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert, resize, optimize, and prepare media files.
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },

    /// Drive a Chrome instance over the DevTools protocol.
    Browser {
        #[command(subcommand)]
        action: BrowserAction,
    },

    /// Process media with the Gemini API.
    Ai {
        #[command(subcommand)]
        action: AiAction,
    },

    /// Search the project with ripgrep (git grep fallback).
    Search {
        /// Pattern to search for.
        #[arg(long)]
        pattern: String,

        /// Also search hidden and gitignored files.
        #[arg(long)]
        include_external: bool,
    },

    /// Filter the telemetry log into a readable file.
    Log {
        /// Output path (defaults to out.log next to the telemetry file).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Generate or apply skill bundle manifests.
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Format a sequential-thinking thought.
    Thought(ThoughtArgs),

    /// Check that required tools and configuration are in place.
    Doctor,
}

// ---------------------------------------------------------------------------
// media
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum MediaAction {
    /// Convert files to another container or codec.
    Convert {
        /// Input files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output extension (e.g. mp4, mp3, webp).
        #[arg(long, short)]
        format: String,

        /// Directory for converted files.
        #[arg(long, short, default_value = "converted")]
        output_dir: PathBuf,

        /// Quality preset: web, archive, or mobile.
        #[arg(long, default_value = "web")]
        preset: String,

        /// Print the commands without running them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Resize images, optionally watermarked.
    Resize {
        /// Input files or directories.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, short)]
        width: Option<u32>,

        #[arg(long, short = 'H')]
        height: Option<u32>,

        /// fit, fill, cover, exact, or thumbnail.
        #[arg(long, default_value = "fit")]
        strategy: String,

        /// JPEG/WebP quality, 0-100.
        #[arg(long, short, default_value_t = 85)]
        quality: u32,

        /// Output extension override (e.g. webp).
        #[arg(long, short)]
        format: Option<String>,

        /// Watermark image composited bottom-right.
        #[arg(long)]
        watermark: Option<PathBuf>,

        /// Descend into directories.
        #[arg(long, short)]
        recursive: bool,

        #[arg(long, short, default_value = "resized")]
        output_dir: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },

    /// Re-encode a video for a smaller file.
    Optimize {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        max_width: Option<u32>,

        #[arg(long)]
        max_height: Option<u32>,

        /// Cap the output frame rate.
        #[arg(long)]
        fps: Option<f64>,

        /// Constant rate factor, lower is better quality.
        #[arg(long, default_value_t = 23)]
        crf: u32,

        #[arg(long, default_value = "128k")]
        audio_bitrate: String,

        /// x264 encoder preset.
        #[arg(long, default_value = "medium")]
        encoder_preset: String,

        /// Two-pass encode for tighter size control.
        #[arg(long)]
        two_pass: bool,

        #[arg(long, short)]
        verbose: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Shrink a file to fit API upload limits.
    Prepare {
        input: PathBuf,
        output: PathBuf,

        /// Target output size in megabytes.
        #[arg(long)]
        target_size: Option<u64>,

        /// Drop content past this many seconds.
        #[arg(long)]
        max_duration: Option<f64>,

        /// Quality, 0-100.
        #[arg(long, short, default_value_t = 85)]
        quality: u32,

        /// Output resolution, WIDTHxHEIGHT.
        #[arg(long)]
        resolution: Option<String>,

        /// Audio bitrate for audio inputs.
        #[arg(long, default_value = "64k")]
        audio_bitrate: String,

        #[arg(long, short)]
        verbose: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Split a video into equal-length chunks without re-encoding.
    Split {
        input: PathBuf,

        #[arg(long, short, default_value = "chunks")]
        output_dir: PathBuf,

        /// Chunk length in seconds.
        #[arg(long, default_value_t = 300.0)]
        chunk_secs: f64,

        #[arg(long, short)]
        verbose: bool,
    },
}

// ---------------------------------------------------------------------------
// browser
// ---------------------------------------------------------------------------

/// Connection options shared by all browser subcommands.
#[derive(Args)]
pub struct BrowserConnection {
    /// Chrome remote debugging port.
    #[arg(long, default_value_t = 9222)]
    pub port: u16,

    /// Explicit Chrome binary path.
    #[arg(long)]
    pub chrome_path: Option<String>,

    /// Run Chrome with a visible window.
    #[arg(long)]
    pub headed: bool,
}

#[derive(Subcommand)]
pub enum BrowserAction {
    /// Open a URL and wait for the page to settle.
    Navigate {
        url: String,

        /// domcontentloaded, load, or networkidle.
        #[arg(long, default_value = "networkidle")]
        wait_until: String,

        /// Navigation timeout in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        timeout: u64,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Click an element (CSS selector or XPath).
    Click {
        selector: String,

        /// Selector to wait for after the click.
        #[arg(long)]
        wait_for: Option<String>,

        /// Element wait timeout in milliseconds.
        #[arg(long, default_value_t = 5000)]
        timeout: u64,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Type a value into an input element.
    Fill {
        selector: String,
        value: String,

        /// Clear the field before typing.
        #[arg(long)]
        clear: bool,

        #[arg(long, default_value_t = 5000)]
        timeout: u64,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Capture a screenshot of the page or one element.
    Screenshot {
        /// Output image path.
        #[arg(long, short, default_value = "screenshot.png")]
        output: PathBuf,

        /// Navigate here first.
        #[arg(long)]
        url: Option<String>,

        /// png, jpeg, or webp.
        #[arg(long, default_value = "png")]
        format: String,

        /// JPEG/WebP quality, 0-100.
        #[arg(long)]
        quality: Option<u32>,

        /// Capture the full scrollable page.
        #[arg(long)]
        full_page: bool,

        /// Capture only this element.
        #[arg(long)]
        selector: Option<String>,

        /// Recompress when larger than this many megabytes.
        #[arg(long, default_value_t = 5.0)]
        max_size: f64,

        /// Skip the compression pass.
        #[arg(long)]
        no_compress: bool,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Dump the interactive elements of the current page.
    Snapshot {
        /// Navigate here first.
        #[arg(long)]
        url: Option<String>,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Monitor console output and page errors.
    Console {
        url: String,

        /// How long to monitor, in seconds.
        #[arg(long, default_value_t = 10)]
        duration: u64,

        /// When navigation counts as done: domcontentloaded, load, networkidle.
        #[arg(long, default_value = "networkidle")]
        wait_until: String,

        /// Only record these console levels (repeatable).
        #[arg(long = "type")]
        types: Vec<String>,

        #[command(flatten)]
        connection: BrowserConnection,
    },

    /// Measure page load performance.
    Perf {
        url: String,

        #[command(flatten)]
        connection: BrowserConnection,
    },
}

// ---------------------------------------------------------------------------
// ai
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum AiAction {
    /// Run a multimodal task over files, or generate from a prompt.
    Process {
        /// Input files (not required for generate).
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        /// transcribe, analyze, extract, or generate.
        #[arg(long)]
        task: String,

        /// Prompt override; each task has a sensible default.
        #[arg(long)]
        prompt: Option<String>,

        /// Model name.
        #[arg(long, default_value = "gemini-2.5-flash")]
        model: String,

        /// text, json, or markdown.
        #[arg(long, default_value = "text")]
        format: String,

        /// Write results to a file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Analyze UI screenshots into structure, layout, and reports.
    Inspect {
        /// Image files or directories of images.
        #[arg(long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Model name.
        #[arg(long, default_value = "gemini-2.5-pro")]
        model: String,

        /// Output directory (defaults to a timestamped dir in the bundle).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Diagnose a screen recording with an AI walkthrough.
    Diagnose {
        /// The recording to analyze.
        #[arg(long)]
        recording: PathBuf,

        /// Prompt override for the diagnosis.
        #[arg(long)]
        prompt: Option<String>,

        /// Model name.
        #[arg(long, default_value = "gemini-2.5-flash")]
        model: String,

        /// Output directory (defaults to a timestamped dir in the bundle).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// manifest
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ManifestAction {
    /// Generate manifest.json for a bundle directory.
    Generate {
        /// Bundle directory (defaults to .skillkit in the project root).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Synchronize an installed bundle against a source bundle.
    Update {
        /// Source bundle directory.
        #[arg(long)]
        source: PathBuf,

        /// Destination bundle directory (defaults to .skillkit in the
        /// project root).
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// thought
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ThoughtArgs {
    /// Thought text.
    #[arg(long)]
    pub thought: String,

    /// Position in the sequence.
    #[arg(long, default_value_t = 1)]
    pub number: u32,

    /// Total thoughts in the sequence.
    #[arg(long, default_value_t = 1)]
    pub total: u32,

    /// Earlier thought this one revises.
    #[arg(long)]
    pub revision: Option<u32>,

    /// Earlier thought this one branches from.
    #[arg(long)]
    pub branch: Option<u32>,

    /// Branch label.
    #[arg(long)]
    pub branch_id: Option<String>,

    /// box, simple, or markdown.
    #[arg(long, default_value = "box")]
    pub format: String,
}
