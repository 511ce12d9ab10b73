//! AI-driven visual analysis pipelines.
//!
//! Two compositions over [`crate::multimodal`]: screen inspection, which
//! turns UI screenshots into structured component data, an HTML layout
//! reconstruction, and a written report; and recording diagnosis, which
//! shrinks a screen recording for upload and asks the model to describe
//! and troubleshoot what happens in it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config;
use crate::error::{Result, SkillError};
use crate::media::optimize::{self, PrepareOptions};
use crate::media::resize::gather_images;
use crate::multimodal::{GenAiClient, OutputFormat};

/// Seconds per recording chunk sent to the model.
const DIAGNOSIS_CHUNK_SECS: f64 = 300.0;

/// Prompt asking the model to decompose one UI screenshot.
const SCREEN_INSPECT_PROMPT: &str = r#"Analyze this UI screenshot.

Return a SINGLE JSON object with three keys: "structure", "html", and "description".

1. "structure": a list of detected UI components, each with:
   - "type": the component kind (Button, Text, Image, Input, Icon, Card, Header).
   - "text": its text content, if any.
   - "box_2d": [ymin, xmin, ymax, xmax] coordinates normalized to 0-1000.
   - "hex_color": the dominant hex color.

2. "html": a valid HTML string reproducing the UI.
   - Style everything with Tailwind CSS classes (layout, typography, colors,
     spacing, shadows, rounded corners).
   - Add a 'data-bounding' attribute to every distinct element in the form
     "ymin,xmin,ymax,xmax" on the same 0-1000 scale.
   - Do not include <html>, <head>, or <body> tags, only the root container.

3. "description": a comprehensive top-to-bottom technical description of the
   UI, written so another agent could replicate it exactly. Describe the
   layout hierarchy, alignment, and styling details. Do not list raw
   coordinates."#;

/// Prompt asking the model to mine repeated components across screens.
const CROSS_ANALYSIS_PROMPT: &str = r#"You are a UI architect. Below is structural JSON for multiple screens of one app. Identify the reusable components (design system candidates).

Look for:
1. Navigation bars (top or bottom) appearing on multiple screens.
2. Repeated card layouts.
3. Common elements (buttons with the same color and style, standard inputs).

Output a Markdown report listing, for each candidate: a component name, how
many screens it appears on, which screens, and an implementation suggestion.

Input data:
"#;

/// Default prompt for recording diagnosis.
const RECORDING_DIAGNOSIS_PROMPT: &str = "You are reviewing a screen recording of a user session. \
     Describe what happens step by step, identify any errors, broken flows, \
     or UI problems visible in the recording, and suggest likely causes. \
     Output a Markdown report with sections for Timeline, Issues Found, and \
     Recommendations.";

/// Outcome of a screen inspection run.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub output_dir: PathBuf,
    /// Files whose analysis artifacts were written.
    pub analyzed: Vec<String>,
    /// Files the model or the JSON parse failed on.
    pub failed: Vec<String>,
    /// Whether the cross-screen report was produced.
    pub cross_analysis: bool,
}

/// Outcome of a recording diagnosis run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub recording: String,
    pub chunks: usize,
    pub report_path: PathBuf,
}

/// Analyze UI screenshots and write per-screen artifacts plus a
/// cross-screen component report.
///
/// For each screen this writes `structure-<slug>.json`, `layout-<slug>.html`,
/// and `report-<slug>.md` into `output_dir` (a timestamped directory under
/// the bundle when not given). A failure on one screen never aborts the
/// rest; when more than one screen succeeds, a reusable-components report is
/// generated across all of them.
pub async fn inspect_screens(
    client: &GenAiClient,
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
) -> Result<InspectReport> {
    let screens = gather_images(inputs, false);
    if screens.is_empty() {
        return Err(SkillError::InvalidInput {
            skill: "screen_inspect".into(),
            reason: "no image files found in the given inputs".into(),
        });
    }

    let out_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_output_dir("analysis"),
    };
    std::fs::create_dir_all(&out_dir)?;
    info!(dir = %out_dir.display(), screens = screens.len(), "inspecting screens");

    let mut report = InspectReport {
        output_dir: out_dir.clone(),
        analyzed: Vec::new(),
        failed: Vec::new(),
        cross_analysis: false,
    };
    let mut summaries = Vec::new();

    for screen in &screens {
        let name = screen
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "screen".into());
        let slug = slugify(&name);
        info!(screen = %name, "analyzing");

        let response = match client
            .process_file(screen, SCREEN_INSPECT_PROMPT, OutputFormat::Json)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(screen = %name, error = %e, "analysis failed");
                report.failed.push(name);
                continue;
            }
        };

        let data: Value = match serde_json::from_str(extract_json_block(&response)) {
            Ok(value) => value,
            Err(e) => {
                warn!(screen = %name, error = %e, "model returned malformed JSON");
                std::fs::write(out_dir.join(format!("error-{slug}.txt")), &response)?;
                report.failed.push(name);
                continue;
            }
        };

        // Older model revisions used "components" for the structure list.
        let components = data
            .get("structure")
            .or_else(|| data.get("components"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        std::fs::write(
            out_dir.join(format!("structure-{slug}.json")),
            serde_json::to_string_pretty(&components)?,
        )?;

        if let Some(html) = data.get("html").and_then(|v| v.as_str()) {
            if !html.is_empty() {
                std::fs::write(
                    out_dir.join(format!("layout-{slug}.html")),
                    layout_page(&name, html),
                )?;
            }
        }

        let description = data
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("No description generated.");
        std::fs::write(
            out_dir.join(format!("report-{slug}.md")),
            format!("# UI Analysis: {name}\n\n{description}\n"),
        )?;

        summaries.push(json!({
            "file": name,
            "components": summarize_components(&components),
        }));
        report.analyzed.push(
            screen
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
    }

    if summaries.len() > 1 {
        info!(screens = summaries.len(), "running cross-screen analysis");
        let prompt = format!(
            "{CROSS_ANALYSIS_PROMPT}{}",
            serde_json::to_string_pretty(&summaries)?
        );
        match client.generate_text(&prompt, OutputFormat::Markdown).await {
            Ok(text) => {
                std::fs::write(out_dir.join("analysis-reusable-components.md"), text)?;
                report.cross_analysis = true;
            }
            Err(e) => warn!(error = %e, "cross-screen analysis failed"),
        }
    }

    Ok(report)
}

/// Diagnose a screen recording: shrink it for upload, split long footage
/// into chunks, run the diagnosis prompt over each chunk, and write a
/// combined Markdown report into the output directory.
pub async fn diagnose_recording(
    client: &GenAiClient,
    recording: &Path,
    prompt: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<DiagnosisReport> {
    if crate::media::MediaKind::from_path(recording) != crate::media::MediaKind::Video {
        return Err(SkillError::InvalidInput {
            skill: "recording_diagnose".into(),
            reason: format!("`{}` is not a video recording", recording.display()),
        });
    }

    let out_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_output_dir("diagnosis"),
    };
    std::fs::create_dir_all(&out_dir)?;

    let prepared = out_dir.join("prepared.mp4");
    optimize::prepare_for_upload(recording, &prepared, &PrepareOptions::default()).await?;
    let chunks =
        optimize::split_video(&prepared, &out_dir, DIAGNOSIS_CHUNK_SECS, false).await?;
    info!(chunks = chunks.len(), "diagnosing recording");

    let prompt = prompt.unwrap_or(RECORDING_DIAGNOSIS_PROMPT);
    let mut sections = Vec::new();
    let mut failures = 0;
    for (index, chunk) in chunks.iter().enumerate() {
        let heading = if chunks.len() > 1 {
            format!("## Segment {} of {}\n\n", index + 1, chunks.len())
        } else {
            String::new()
        };
        match client
            .process_file(chunk, prompt, OutputFormat::Markdown)
            .await
        {
            Ok(text) => sections.push(format!("{heading}{text}")),
            Err(e) => {
                warn!(chunk = %chunk.display(), error = %e, "diagnosis failed");
                sections.push(format!("{heading}_Analysis failed: {e}_"));
                failures += 1;
            }
        }
    }

    if failures == chunks.len() {
        return Err(SkillError::ExecutionFailed {
            skill: "recording_diagnose".into(),
            reason: "every segment failed to analyze".into(),
        });
    }

    let recording_name = recording
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| recording.display().to_string());
    let report_path = out_dir.join("report.md");
    std::fs::write(
        &report_path,
        format!(
            "# Recording Diagnosis: {recording_name}\n\n{}\n",
            sections.join("\n\n")
        ),
    )?;

    Ok(DiagnosisReport {
        recording: recording_name,
        chunks: chunks.len(),
        report_path,
    })
}

/// Timestamped output directory under the project bundle.
fn default_output_dir(kind: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    config::bundle_dir(&config::project_root()).join(format!("{kind}-{timestamp}"))
}

/// File-name-safe lowercase slug.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Strip a Markdown code fence around a JSON payload, if present.
fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Wrap a reconstructed UI fragment in a standalone preview page.
fn layout_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} Analysis</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>
      body {{ background-color: #f3f4f6; padding: 20px; font-family: sans-serif; display: flex; justify-content: center; }}
      .preview-container {{
        position: relative;
        max-width: 100%;
        width: 1000px;
        background: white;
        box-shadow: 0 4px 6px -1px rgba(0, 0, 0, 0.1);
        overflow: hidden;
      }}
      *[data-bounding]:hover {{
        outline: 2px solid red;
        cursor: crosshair;
      }}
    </style>
</head>
<body>
    <div class="preview-container">
        {body}
    </div>
</body>
</html>"#
    )
}

/// Condensed component list for the cross-screen prompt.
fn summarize_components(components: &Value) -> Value {
    let Some(items) = components.as_array() else {
        return json!([]);
    };
    Value::Array(
        items
            .iter()
            .map(|c| {
                json!({
                    "type": c.get("type").cloned().unwrap_or(Value::Null),
                    "text": c.get("text").cloned().unwrap_or(Value::Null),
                    "color": c.get("hex_color").cloned().unwrap_or(Value::Null),
                })
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multimodal::GenAiConfig;

    fn offline_client() -> GenAiClient {
        GenAiClient::new(GenAiConfig {
            api_key: "test-key".into(),
            model: "gemini-2.5-flash".into(),
        })
        .expect("client")
    }

    #[test]
    fn slugify_keeps_alphanumerics() {
        assert_eq!(slugify("Home Screen (v2).png"), "home-screen-v2-png");
        assert_eq!(slugify("login.png"), "login-png");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn extract_json_block_strips_fences() {
        assert_eq!(extract_json_block(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(
            extract_json_block("```json\n{\"a\": 1}\n```"),
            r#"{"a": 1}"#
        );
        assert_eq!(extract_json_block("```\n{}\n```"), "{}");
    }

    #[test]
    fn layout_page_wires_bounding_preview() {
        let page = layout_page("home.png", r#"<button data-bounding="0,0,10,10">Go</button>"#);
        assert!(page.contains("home.png Analysis"));
        assert!(page.contains("data-bounding"));
        assert!(page.contains("*[data-bounding]:hover"));
        assert!(page.contains("cdn.tailwindcss.com"));
    }

    #[test]
    fn summarize_components_keeps_type_text_color() {
        let components = json!([
            { "type": "Button", "text": "Submit", "hex_color": "#2563eb", "box_2d": [0, 0, 10, 10] }
        ]);
        let summary = summarize_components(&components);
        assert_eq!(summary[0]["type"], json!("Button"));
        assert_eq!(summary[0]["color"], json!("#2563eb"));
        assert!(summary[0].get("box_2d").is_none());
    }

    #[tokio::test]
    async fn inspect_rejects_empty_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = offline_client();
        let result = inspect_screens(&client, &[dir.path().to_path_buf()], None).await;
        assert!(matches!(result, Err(SkillError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn diagnose_rejects_non_video_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "not a recording").expect("write");
        let client = offline_client();
        let result = diagnose_recording(&client, &notes, None, Some(dir.path())).await;
        assert!(matches!(result, Err(SkillError::InvalidInput { .. })));
    }
}
