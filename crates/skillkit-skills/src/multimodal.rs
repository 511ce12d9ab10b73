//! Gemini multimodal client.
//!
//! Sends local media files to the Generative Language API for
//! transcription, analysis, and extraction, and runs plain text-to-content
//! generation. Files up to 20MB travel inline as base64; larger files go
//! through the Files API and are polled until processing finishes.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{Result, SkillError};

const GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GENAI_UPLOAD_URL: &str =
    "https://generativelanguage.googleapis.com/upload/v1beta/files";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Files above this size are uploaded instead of inlined.
pub const INLINE_LIMIT_BYTES: u64 = 20 * 1024 * 1024;

/// Interval between file-state polls after an upload.
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up on file processing after this long.
const UPLOAD_POLL_TIMEOUT_SECS: u64 = 300;

/// Overall HTTP timeout per request. Large media prompts are slow.
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// What to do with each input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Transcribe,
    Analyze,
    Extract,
    Generate,
}

impl Task {
    /// Prompt used when the caller does not supply one.
    pub fn default_prompt(self) -> &'static str {
        match self {
            Task::Transcribe => {
                "Generate a complete, accurate transcript of this media. \
                 Include speaker labels if multiple speakers are present."
            }
            Task::Analyze => {
                "Analyze this media in detail. Describe the content, \
                 structure, and any notable elements."
            }
            Task::Extract => {
                "Extract all text and structured content from this file. \
                 Preserve formatting, tables, and hierarchy."
            }
            Task::Generate => "",
        }
    }
}

impl std::str::FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(Task::Transcribe),
            "analyze" => Ok(Task::Analyze),
            "extract" => Ok(Task::Extract),
            "generate" => Ok(Task::Generate),
            other => Err(format!(
                "unknown task `{other}` (transcribe, analyze, extract, generate)"
            )),
        }
    }
}

/// Response format requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown format `{other}` (text, json, markdown)")),
        }
    }
}

/// API key and model selection for the client.
#[derive(Debug, Clone)]
pub struct GenAiConfig {
    pub api_key: String,
    pub model: String,
}

impl GenAiConfig {
    /// Read the API key from `GEMINI_API_KEY`, falling back to
    /// `GOOGLE_API_KEY`.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                SkillError::Config(
                    "GEMINI_API_KEY not set (GOOGLE_API_KEY also accepted)".into(),
                )
            })?;
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
        })
    }
}

/// Per-file outcome of a batch run. Errors never abort the batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub status: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn success(file: impl Into<String>, response: String) -> Self {
        Self {
            status: "success".into(),
            file: file.into(),
            response: Some(response),
            error: None,
        }
    }

    fn failure(file: impl Into<String>, error: String) -> Self {
        Self {
            status: "error".into(),
            file: file.into(),
            response: None,
            error: Some(error),
        }
    }
}

pub struct GenAiClient {
    config: GenAiConfig,
    http: reqwest::Client,
}

impl GenAiClient {
    pub fn new(config: GenAiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("skillkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    /// Run the prompt over each file sequentially, collecting per-file
    /// results. A failure on one file never aborts the rest.
    pub async fn process_batch(
        &self,
        files: &[String],
        prompt: &str,
        format: OutputFormat,
    ) -> Vec<FileReport> {
        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            let path = Path::new(file);
            info!(file = file, "processing");
            let report = match self.process_file(path, prompt, format).await {
                Ok(response) => FileReport::success(file.clone(), response),
                Err(e) => {
                    warn!(file = file, error = %e, "processing failed");
                    FileReport::failure(file.clone(), e.to_string())
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Send one file plus the prompt to the model and return its text reply.
    pub async fn process_file(
        &self,
        path: &Path,
        prompt: &str,
        format: OutputFormat,
    ) -> Result<String> {
        let size = std::fs::metadata(path)?.len();
        let mime = mime_for_path(path);

        let media_part = if size > INLINE_LIMIT_BYTES {
            let uri = self.upload_and_wait(path, mime).await?;
            json!({ "file_data": { "mime_type": mime, "file_uri": uri } })
        } else {
            let bytes = std::fs::read(path)?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            json!({ "inline_data": { "mime_type": mime, "data": encoded } })
        };

        let parts = vec![json!({ "text": prompt }), media_part];
        self.generate_content(parts, format).await
    }

    /// Text-only generation, used by the `generate` task.
    pub async fn generate_text(&self, prompt: &str, format: OutputFormat) -> Result<String> {
        self.generate_content(vec![json!({ "text": prompt })], format)
            .await
    }

    async fn generate_content(
        &self,
        parts: Vec<Value>,
        format: OutputFormat,
    ) -> Result<String> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if format == OutputFormat::Json {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        let url = format!(
            "{GENAI_BASE_URL}/models/{}:generateContent",
            self.config.model
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let value = check_api_response(response).await?;

        let text = value
            .pointer("/candidates/0/content/parts")
            .and_then(|v| v.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = value
                .pointer("/candidates/0/finishReason")
                .and_then(|v| v.as_str())
                .unwrap_or("empty response");
            return Err(SkillError::Api {
                status: 200,
                message: format!("model returned no text ({reason})"),
            });
        }
        Ok(text)
    }

    /// Upload a file through the Files API and poll until it is ACTIVE.
    async fn upload_and_wait(&self, path: &Path, mime: &str) -> Result<String> {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_owned());
        info!(file = %path.display(), mime = mime, "uploading large file");

        let bytes = std::fs::read(path)?;
        let metadata = serde_json::to_string(&json!({
            "file": { "display_name": display_name }
        }))?;
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata)
                    .mime_str("application/json")
                    .map_err(SkillError::Http)?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .mime_str(mime)
                    .map_err(SkillError::Http)?,
            );

        let response = self
            .http
            .post(GENAI_UPLOAD_URL)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("uploadType", "multipart"),
            ])
            .multipart(form)
            .send()
            .await?;
        let value = check_api_response(response).await?;

        let name = value
            .pointer("/file/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SkillError::Api {
                status: 200,
                message: "upload response had no file name".into(),
            })?
            .to_owned();

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(UPLOAD_POLL_TIMEOUT_SECS);
        loop {
            let file = self.get_file(&name).await?;
            let state = file
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or("PROCESSING");
            match state {
                "ACTIVE" => {
                    let uri = file
                        .get("uri")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| SkillError::Api {
                            status: 200,
                            message: "active file had no uri".into(),
                        })?;
                    info!(uri = uri, "file active");
                    return Ok(uri.to_owned());
                }
                "FAILED" => {
                    return Err(SkillError::Api {
                        status: 200,
                        message: format!("server-side processing failed for {display_name}"),
                    });
                }
                _ => {
                    debug!(state = state, "waiting for file processing");
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SkillError::Timeout {
                            seconds: UPLOAD_POLL_TIMEOUT_SECS,
                            reason: format!("file {display_name} never became ACTIVE"),
                        });
                    }
                    tokio::time::sleep(UPLOAD_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn get_file(&self, name: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{GENAI_BASE_URL}/{name}"))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;
        check_api_response(response).await
    }
}

/// Turn a non-2xx API response into [`SkillError::Api`] with the server's
/// error message when one is present.
async fn check_api_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or(body);
    Err(SkillError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Best-effort MIME type from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_parsing_and_default_prompts() {
        let task: Task = "transcribe".parse().expect("parse");
        assert_eq!(task, Task::Transcribe);
        assert!(task.default_prompt().contains("transcript"));
        assert!("summarize".parse::<Task>().is_err());
        assert_eq!(Task::Generate.default_prompt(), "");
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("json".parse::<OutputFormat>().expect("parse"), OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn mime_lookup_covers_media_and_documents() {
        assert_eq!(mime_for_path(Path::new("a.mp4")), "video/mp4");
        assert_eq!(mime_for_path(Path::new("a.FLAC")), "audio/flac");
        assert_eq!(mime_for_path(Path::new("slides.pdf")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("mystery.bin")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn file_report_shapes() {
        let ok = FileReport::success("a.mp4", "transcript".into());
        assert_eq!(ok.status, "success");
        assert!(ok.error.is_none());

        let err = FileReport::failure("b.mp4", "boom".into());
        assert_eq!(err.status, "error");
        assert!(err.response.is_none());
    }

    #[test]
    fn config_from_env_requires_a_key() {
        // Serialized via temp-env style save/restore to avoid cross-test races.
        let saved_gemini = std::env::var("GEMINI_API_KEY").ok();
        let saved_google = std::env::var("GOOGLE_API_KEY").ok();
        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
            std::env::remove_var("GOOGLE_API_KEY");
        }
        assert!(GenAiConfig::from_env(None).is_err());
        unsafe {
            std::env::set_var("GEMINI_API_KEY", "test-key");
        }
        let cfg = GenAiConfig::from_env(Some("gemini-2.5-pro".into())).expect("config");
        assert_eq!(cfg.model, "gemini-2.5-pro");
        unsafe {
            match saved_gemini {
                Some(v) => std::env::set_var("GEMINI_API_KEY", v),
                None => std::env::remove_var("GEMINI_API_KEY"),
            }
            match saved_google {
                Some(v) => std::env::set_var("GOOGLE_API_KEY", v),
                None => std::env::remove_var("GOOGLE_API_KEY"),
            }
        }
    }
}
