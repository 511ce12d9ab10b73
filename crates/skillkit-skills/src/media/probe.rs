//! Media probing via `ffprobe`.
//!
//! Runs `ffprobe -print_format json -show_format -show_streams` and reshapes
//! the result into [`MediaInfo`].  The JSON layout is owned by ffprobe; this
//! module only extracts the handful of fields the optimization skills need.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SkillError};
use crate::exec;

/// Seconds allowed for a probe before giving up.
const PROBE_TIMEOUT_SECS: u64 = 60;

/// Summary of a media file as reported by ffprobe.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration: f64,
    /// Video width in pixels, zero for audio-only files.
    pub width: u32,
    /// Video height in pixels, zero for audio-only files.
    pub height: u32,
    /// Container bitrate in bits per second.
    pub bitrate: u64,
    /// Video frame rate.
    pub fps: f64,
    /// File size in bytes.
    pub size: u64,
    /// Video codec name, empty for audio-only files.
    pub video_codec: String,
    /// Audio codec name, empty when there is no audio stream.
    pub audio_codec: String,
    /// Audio stream bitrate in bits per second.
    pub audio_bitrate: u64,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u32,
}

/// Probe a media file with ffprobe.
pub async fn probe(path: &Path) -> Result<MediaInfo> {
    let argv = vec![
        "ffprobe".to_string(),
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.display().to_string(),
    ];

    let output = exec::run_checked(&argv, PROBE_TIMEOUT_SECS).await?;
    let data: Value = serde_json::from_str(&output.stdout)?;
    let info = parse_probe_output(&data).ok_or_else(|| SkillError::ExecutionFailed {
        skill: "media_probe".into(),
        reason: format!("ffprobe output for `{}` had no usable streams", path.display()),
    })?;

    debug!(
        path = %path.display(),
        duration = info.duration,
        width = info.width,
        height = info.height,
        "probed media file"
    );
    Ok(info)
}

/// Reshape raw ffprobe JSON into [`MediaInfo`].
///
/// The first video stream and first audio stream win.  Returns `None` when
/// neither kind of stream is present.
pub fn parse_probe_output(data: &Value) -> Option<MediaInfo> {
    let streams = data.get("streams").and_then(|s| s.as_array());
    let empty = Vec::new();
    let streams = streams.unwrap_or(&empty);

    let video = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"));
    let audio = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("audio"));

    if video.is_none() && audio.is_none() {
        return None;
    }

    let format = data.get("format").cloned().unwrap_or(Value::Null);

    let mut info = MediaInfo {
        duration: str_field_f64(&format, "duration"),
        bitrate: str_field_u64(&format, "bit_rate"),
        size: str_field_u64(&format, "size"),
        ..MediaInfo::default()
    };

    if let Some(v) = video {
        info.width = v.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
        info.height = v.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;
        info.fps = parse_frame_rate(
            v.get("r_frame_rate").and_then(|r| r.as_str()).unwrap_or("0/1"),
        );
        info.video_codec = v
            .get("codec_name")
            .and_then(|c| c.as_str())
            .unwrap_or("unknown")
            .to_string();
    }

    if let Some(a) = audio {
        info.audio_codec = a
            .get("codec_name")
            .and_then(|c| c.as_str())
            .unwrap_or("unknown")
            .to_string();
        info.audio_bitrate = str_field_u64(a, "bit_rate");
        info.sample_rate = str_field_u64(a, "sample_rate") as u32;
        info.channels = a.get("channels").and_then(|c| c.as_u64()).unwrap_or(0) as u32;
    }

    Some(info)
}

/// Parse an ffprobe rational frame rate such as `"30000/1001"`.
fn parse_frame_rate(raw: &str) -> f64 {
    let mut parts = raw.splitn(2, '/');
    let num: f64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0.0);
    let den: f64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1.0);
    if den == 0.0 { 0.0 } else { num / den }
}

/// ffprobe reports numeric format fields as strings; parse or default to zero.
fn str_field_u64(value: &Value, field: &str) -> u64 {
    match value.get(field) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn str_field_f64(value: &Value, field: &str) -> f64 {
    match value.get(field) {
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_probe_output_full_video() {
        let data = json!({
            "format": { "duration": "12.5", "bit_rate": "2000000", "size": "3125000" },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "bit_rate": "128000",
                    "sample_rate": "44100",
                    "channels": 2
                }
            ]
        });

        let info = parse_probe_output(&data).expect("should parse");
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.video_codec, "h264");
        assert_eq!(info.audio_codec, "aac");
        assert_eq!(info.audio_bitrate, 128_000);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert!((info.duration - 12.5).abs() < f64::EPSILON);
        assert!((info.fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn parse_probe_output_audio_only() {
        let data = json!({
            "format": { "duration": "60", "bit_rate": "192000", "size": "1440000" },
            "streams": [
                { "codec_type": "audio", "codec_name": "mp3", "bit_rate": "192000" }
            ]
        });

        let info = parse_probe_output(&data).expect("should parse");
        assert_eq!(info.width, 0);
        assert_eq!(info.audio_codec, "mp3");
        assert!(info.video_codec.is_empty());
    }

    #[test]
    fn parse_probe_output_no_streams_is_none() {
        let data = json!({ "format": { "duration": "0" }, "streams": [] });
        assert!(parse_probe_output(&data).is_none());
    }

    #[test]
    fn frame_rate_handles_zero_denominator() {
        assert_eq!(parse_frame_rate("30/0"), 0.0);
        assert_eq!(parse_frame_rate("25/1"), 25.0);
        assert_eq!(parse_frame_rate("garbage"), 0.0);
    }
}
