//! Page operations built on a [`CdpSession`].
//!
//! Each function here backs one `skillkit browser` subcommand: navigate,
//! click, fill, screenshot, snapshot, console monitoring, and performance
//! measurement.  All page interaction goes through `Runtime.evaluate` with
//! JSON-string results so CSS and XPath selectors behave identically.

use std::path::Path;
use std::time::Duration;

use base64::Engine as _;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::browser::selector::{self, ParsedSelector};
use crate::browser::{CdpEvent, CdpSession};
use crate::error::{Result, SkillError};
use crate::exec;

/// Default element wait timeout in milliseconds.
pub const DEFAULT_ELEMENT_TIMEOUT_MS: u64 = 5000;

/// Default navigation timeout in milliseconds.
pub const DEFAULT_NAV_TIMEOUT_MS: u64 = 30_000;

/// Poll interval while waiting for elements or page readiness.
const POLL_INTERVAL_MS: u64 = 250;

/// Default screenshot size ceiling in megabytes before compression kicks in.
pub const DEFAULT_SCREENSHOT_MAX_MB: f64 = 5.0;

/// How long to let the network settle for the `networkidle` strategy.
const NETWORK_IDLE_SETTLE_MS: u64 = 500;

/// Page readiness strategies for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// `document.readyState === "interactive"` or later.
    DomContentLoaded,
    /// `document.readyState === "complete"`.
    Load,
    /// `load` plus a short settle delay.
    #[default]
    NetworkIdle,
}

impl std::str::FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" | "networkidle2" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!(
                "unknown wait strategy `{other}` (domcontentloaded, load, networkidle)"
            )),
        }
    }
}

/// Result of a navigation or interaction, reported back as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub success: bool,
    pub url: String,
    pub title: String,
}

/// Evaluate a JS expression and return its value.
///
/// Uses `returnByValue` and surfaces page exceptions as errors (CDP wraps
/// the thrown value in `exceptionDetails`).
pub async fn evaluate(session: &mut CdpSession, expression: &str) -> Result<Value> {
    let result = session
        .command(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": true,
            }),
        )
        .await?;

    if let Some(exception) = result.get("exceptionDetails") {
        let text = exception
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown exception");
        return Err(SkillError::ExecutionFailed {
            skill: "browser".into(),
            reason: format!("JavaScript exception: {text}"),
        });
    }

    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}

/// Evaluate a snippet that returns a JSON string, and parse it.
async fn evaluate_json(session: &mut CdpSession, expression: &str) -> Result<Value> {
    let value = evaluate(session, expression).await?;
    match value {
        Value::String(s) => Ok(serde_json::from_str(&s)?),
        other => Ok(other),
    }
}

/// Current URL and title of the page.
async fn page_summary(session: &mut CdpSession) -> Result<PageSummary> {
    let value = evaluate_json(
        session,
        r#"JSON.stringify({ url: window.location.href, title: document.title })"#,
    )
    .await?;
    Ok(PageSummary {
        success: true,
        url: value
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        title: value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

/// Navigate to a URL and wait for the requested readiness state.
pub async fn navigate(
    session: &mut CdpSession,
    url: &str,
    wait_until: WaitUntil,
    timeout_ms: u64,
) -> Result<PageSummary> {
    // Validate before touching the browser.
    url::Url::parse(url).map_err(|e| SkillError::InvalidInput {
        skill: "browser_navigate".into(),
        reason: format!("invalid URL `{url}`: {e}"),
    })?;

    debug!(url = url, "navigating");
    let result = session.command("Page.navigate", json!({ "url": url })).await?;
    if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
        if !error_text.is_empty() {
            return Err(SkillError::ExecutionFailed {
                skill: "browser_navigate".into(),
                reason: format!("navigation to `{url}` failed: {error_text}"),
            });
        }
    }

    wait_for_ready(session, wait_until, timeout_ms).await?;

    let summary = page_summary(session).await?;
    info!(url = %summary.url, title = %summary.title, "navigation complete");
    Ok(summary)
}

/// Poll `document.readyState` until the wait strategy is satisfied.
async fn wait_for_ready(
    session: &mut CdpSession,
    wait_until: WaitUntil,
    timeout_ms: u64,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let state = evaluate(session, "document.readyState").await?;
        let state = state.as_str().unwrap_or("loading");
        let ready = match wait_until {
            WaitUntil::DomContentLoaded => state != "loading",
            WaitUntil::Load | WaitUntil::NetworkIdle => state == "complete",
        };
        if ready {
            if wait_until == WaitUntil::NetworkIdle {
                tokio::time::sleep(Duration::from_millis(NETWORK_IDLE_SETTLE_MS)).await;
            }
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(SkillError::Timeout {
                seconds: timeout_ms / 1000,
                reason: format!("page did not reach readiness (readyState={state})"),
            });
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Wait until the selector matches a visible element.
pub async fn wait_for_element(
    session: &mut CdpSession,
    parsed: &ParsedSelector,
    timeout_ms: u64,
) -> Result<()> {
    let probe = selector::probe_js(parsed);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let status = evaluate_json(session, &probe).await?;
        let found = status.get("found").and_then(|v| v.as_bool()).unwrap_or(false);
        let visible = status
            .get("visible")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if found && visible {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(selector::not_found_error(&parsed.raw, timeout_ms));
        }
        tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
    }
}

/// Click the element matched by `raw_selector`, optionally waiting for a
/// follow-up selector to appear afterwards.
pub async fn click(
    session: &mut CdpSession,
    raw_selector: &str,
    wait_for_after: Option<&str>,
    timeout_ms: u64,
) -> Result<PageSummary> {
    let parsed = selector::parse_selector(raw_selector)?;
    wait_for_element(session, &parsed, timeout_ms).await?;

    let outcome = evaluate_json(session, &selector::click_js(&parsed)).await?;
    if outcome.get("error").is_some() {
        return Err(selector::not_found_error(raw_selector, timeout_ms));
    }
    debug!(selector = raw_selector, "clicked element");

    if let Some(follow) = wait_for_after {
        let follow_parsed = selector::parse_selector(follow)?;
        wait_for_element(session, &follow_parsed, timeout_ms).await?;
    }

    page_summary(session).await
}

/// Fill the element matched by `raw_selector` with `value`.
pub async fn fill(
    session: &mut CdpSession,
    raw_selector: &str,
    value: &str,
    clear: bool,
    timeout_ms: u64,
) -> Result<PageSummary> {
    let parsed = selector::parse_selector(raw_selector)?;
    wait_for_element(session, &parsed, timeout_ms).await?;

    let outcome = evaluate_json(session, &selector::fill_js(&parsed, value, clear)).await?;
    if outcome.get("error").is_some() {
        return Err(selector::not_found_error(raw_selector, timeout_ms));
    }
    debug!(selector = raw_selector, length = value.len(), "filled element");

    page_summary(session).await
}

/// Options for a screenshot capture.
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    /// `png`, `jpeg`, or `webp`.
    pub format: String,
    /// JPEG/WebP quality, 0-100.
    pub quality: Option<u32>,
    /// Capture the whole scrollable page, not just the viewport.
    pub full_page: bool,
    /// Restrict the capture to one element.
    pub selector: Option<String>,
    /// Recompress with ImageMagick when the file exceeds this many MB.
    pub max_size_mb: f64,
    /// Disable the compression pass entirely.
    pub no_compress: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            format: "png".into(),
            quality: None,
            full_page: false,
            selector: None,
            max_size_mb: DEFAULT_SCREENSHOT_MAX_MB,
            no_compress: false,
        }
    }
}

/// Report returned by [`screenshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotReport {
    pub success: bool,
    pub output: String,
    pub size: u64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
}

/// Capture a screenshot to `output`.
pub async fn screenshot(
    session: &mut CdpSession,
    output: &Path,
    opts: &ScreenshotOptions,
) -> Result<ScreenshotReport> {
    if !matches!(opts.format.as_str(), "png" | "jpeg" | "webp") {
        return Err(SkillError::InvalidInput {
            skill: "browser_screenshot".into(),
            reason: format!(
                "unsupported format `{}`; use png, jpeg, or webp",
                opts.format
            ),
        });
    }

    let mut params = json!({
        "format": opts.format,
        "captureBeyondViewport": opts.full_page,
    });
    if let Some(quality) = opts.quality {
        if opts.format != "png" {
            params["quality"] = json!(quality.min(100));
        }
    }

    if let Some(raw_selector) = &opts.selector {
        let parsed = selector::parse_selector(raw_selector)?;
        wait_for_element(session, &parsed, DEFAULT_ELEMENT_TIMEOUT_MS).await?;
        let rect = evaluate_json(session, &selector::rect_js(&parsed)).await?;
        if rect.get("error").is_some() {
            return Err(selector::not_found_error(
                raw_selector,
                DEFAULT_ELEMENT_TIMEOUT_MS,
            ));
        }
        params["clip"] = json!({
            "x": rect.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0),
            "y": rect.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0),
            "width": rect.get("width").and_then(|v| v.as_f64()).unwrap_or(0.0),
            "height": rect.get("height").and_then(|v| v.as_f64()).unwrap_or(0.0),
            "scale": 1.0,
        });
    }

    let result = session.command("Page.captureScreenshot", params).await?;
    let data = result
        .get("data")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SkillError::ExecutionFailed {
            skill: "browser_screenshot".into(),
            reason: "CDP screenshot response had no data".into(),
        })?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SkillError::ExecutionFailed {
            skill: "browser_screenshot".into(),
            reason: format!("failed to decode screenshot data: {e}"),
        })?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, &bytes)?;
    let original_size = bytes.len() as u64;
    info!(output = %output.display(), size = original_size, "screenshot written");

    let mut report = ScreenshotReport {
        success: true,
        output: output.display().to_string(),
        size: original_size,
        url: page_summary(session).await?.url,
        compressed: None,
        original_size: None,
    };

    if !opts.no_compress {
        if let Some(final_size) = compress_if_needed(output, opts.max_size_mb).await? {
            report.compressed = Some(true);
            report.original_size = Some(original_size);
            report.size = final_size;
        }
    }

    Ok(report)
}

/// Recompress an image with ImageMagick when it exceeds `max_size_mb`.
///
/// Two passes: a gentle resize/quality pass, then a more aggressive one if
/// the file is still over the cap.  Missing ImageMagick downgrades to a
/// warning.  Returns the final size when compression ran.
async fn compress_if_needed(path: &Path, max_size_mb: f64) -> Result<Option<u64>> {
    let max_bytes = (max_size_mb * 1024.0 * 1024.0) as u64;
    let size = std::fs::metadata(path)?.len();
    if size <= max_bytes {
        return Ok(None);
    }

    if !exec::check_command("magick", "-version").await {
        warn!("ImageMagick not found; skipping screenshot compression");
        return Ok(None);
    }

    let ext = crate::media::extension_lowercase(path).unwrap_or_else(|| "png".into());
    let is_png = ext == "png";
    // Keep the real extension so ImageMagick can pick the output encoder.
    let tmp = path.with_extension(format!("tmp.{ext}"));

    let first_pass: Vec<String> = if is_png {
        ["magick", &path.display().to_string(), "-strip", "-resize", "90%", "-quality", "85"]
            .iter()
            .map(|s| s.to_string())
            .chain([tmp.display().to_string()])
            .collect()
    } else {
        ["magick", &path.display().to_string(), "-strip", "-quality", "80", "-interlace", "Plane"]
            .iter()
            .map(|s| s.to_string())
            .chain([tmp.display().to_string()])
            .collect()
    };
    exec::run_checked(&first_pass, 300).await?;

    let mut final_size = std::fs::metadata(&tmp)?.len();
    if final_size > max_bytes {
        let tmp2 = path.with_extension(format!("tmp2.{ext}"));
        let second_pass: Vec<String> = if is_png {
            ["magick", &tmp.display().to_string(), "-strip", "-resize", "75%", "-quality", "70"]
                .iter()
                .map(|s| s.to_string())
                .chain([tmp2.display().to_string()])
                .collect()
        } else {
            ["magick", &tmp.display().to_string(), "-strip", "-quality", "60", "-sampling-factor", "4:2:0"]
                .iter()
                .map(|s| s.to_string())
                .chain([tmp2.display().to_string()])
                .collect()
        };
        exec::run_checked(&second_pass, 300).await?;
        std::fs::rename(&tmp2, path)?;
        let _ = std::fs::remove_file(&tmp);
        final_size = std::fs::metadata(path)?.len();
    } else {
        std::fs::rename(&tmp, path)?;
    }

    debug!(path = %path.display(), size = final_size, "screenshot compressed");
    Ok(Some(final_size))
}

/// JS that collects interactive elements with enough metadata to target
/// them later (CSS selector, XPath, visibility, position).
const SNAPSHOT_JS: &str = r#"(() => {
    const interactive = [
        'a[href]', 'button', 'input', 'textarea', 'select',
        '[onclick]', '[role="button"]', '[role="link"]', '[contenteditable]',
    ];

    function xpathOf(el) {
        if (el.id) return `//*[@id="${el.id}"]`;
        if (el === document.body) return '/html/body';
        if (!el.parentNode) return '';
        let ix = 0;
        const siblings = el.parentNode.childNodes;
        for (let i = 0; i < siblings.length; i++) {
            const sib = siblings[i];
            if (sib === el) {
                return `${xpathOf(el.parentNode)}/${el.tagName.toLowerCase()}[${ix + 1}]`;
            }
            if (sib.nodeType === 1 && sib.tagName === el.tagName) ix++;
        }
        return '';
    }

    const elements = [];
    document.querySelectorAll(interactive.join(', ')).forEach((el, index) => {
        const rect = el.getBoundingClientRect();
        let sel;
        if (el.id) {
            sel = `#${el.id}`;
        } else if (el.classList.length > 0) {
            sel = `${el.tagName.toLowerCase()}.${Array.from(el.classList).join('.')}`;
        } else {
            sel = el.tagName.toLowerCase();
        }
        elements.push({
            index,
            tag: el.tagName.toLowerCase(),
            type: el.type || null,
            id: el.id || null,
            name: el.name || null,
            value: el.value || null,
            text: (el.textContent || '').trim().substring(0, 100) || null,
            href: el.href || null,
            selector: sel,
            xpath: xpathOf(el),
            visible: rect.width > 0 && rect.height > 0,
            position: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
        });
    });
    return JSON.stringify(elements);
})()"#;

/// Capture a DOM snapshot of interactive elements.
pub async fn snapshot(session: &mut CdpSession) -> Result<Value> {
    let elements = evaluate_json(session, SNAPSHOT_JS).await?;
    let summary = page_summary(session).await?;
    let count = elements.as_array().map(|a| a.len()).unwrap_or(0);
    Ok(json!({
        "success": true,
        "url": summary.url,
        "title": summary.title,
        "elementCount": count,
        "elements": elements,
    }))
}

/// One captured console or error message.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleMessage {
    /// Console level (`log`, `warn`, `error`, ...) or `pageerror`.
    pub kind: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

/// Navigate and monitor console output for `duration`.
///
/// `types` restricts the console levels recorded; page exceptions are always
/// recorded as `pageerror`.
pub async fn monitor_console(
    session: &mut CdpSession,
    url: &str,
    wait_until: WaitUntil,
    duration: Duration,
    types: Option<&[String]>,
) -> Result<Vec<ConsoleMessage>> {
    session.command("Runtime.enable", json!({})).await?;
    session.command("Log.enable", json!({})).await?;
    navigate(session, url, wait_until, DEFAULT_NAV_TIMEOUT_MS).await?;

    let events = session.collect_events(duration).await?;
    let mut messages = Vec::new();
    for event in events {
        if let Some(message) = console_event_to_message(&event) {
            let keep = match (&message.kind[..], types) {
                ("pageerror", _) => true,
                (kind, Some(filter)) => filter.iter().any(|t| t == kind),
                (_, None) => true,
            };
            if keep {
                messages.push(message);
            }
        }
    }
    Ok(messages)
}

/// Convert a Runtime event into a [`ConsoleMessage`], if it is one.
fn console_event_to_message(event: &CdpEvent) -> Option<ConsoleMessage> {
    match event.method.as_str() {
        "Runtime.consoleAPICalled" => {
            let kind = event
                .params
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("log")
                .to_string();
            let text = event
                .params
                .get("args")
                .and_then(|v| v.as_array())
                .map(|args| {
                    args.iter()
                        .map(render_remote_object)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            Some(ConsoleMessage {
                kind,
                text,
                url: None,
                line: None,
            })
        }
        "Runtime.exceptionThrown" => {
            let details = event.params.get("exceptionDetails")?;
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|v| v.as_str())
                .or_else(|| details.get("text").and_then(|v| v.as_str()))
                .unwrap_or("unknown exception")
                .to_string();
            Some(ConsoleMessage {
                kind: "pageerror".into(),
                text,
                url: details
                    .get("url")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                line: details.get("lineNumber").and_then(|v| v.as_u64()),
            })
        }
        "Log.entryAdded" => {
            let entry = event.params.get("entry")?;
            Some(ConsoleMessage {
                kind: entry
                    .get("level")
                    .and_then(|v| v.as_str())
                    .unwrap_or("log")
                    .to_string(),
                text: entry
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                url: entry.get("url").and_then(|v| v.as_str()).map(String::from),
                line: entry.get("lineNumber").and_then(|v| v.as_u64()),
            })
        }
        _ => None,
    }
}

/// Render a CDP RemoteObject for display.
fn render_remote_object(obj: &Value) -> String {
    if let Some(value) = obj.get("value") {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    } else if let Some(desc) = obj.get("description").and_then(|v| v.as_str()) {
        desc.to_string()
    } else {
        obj.get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("undefined")
            .to_string()
    }
}

/// JS summarizing navigation timing, paint timing, and resource transfers.
const PERFORMANCE_JS: &str = r#"(() => {
    const out = { fcp: null, ttfb: null, domContentLoaded: null, load: null };
    const paint = performance.getEntriesByType('paint')
        .find(e => e.name === 'first-contentful-paint');
    if (paint) out.fcp = paint.startTime;
    const [nav] = performance.getEntriesByType('navigation');
    if (nav) {
        out.ttfb = nav.responseStart - nav.requestStart;
        out.domContentLoaded = nav.domContentLoadedEventEnd;
        out.load = nav.loadEventEnd;
    }
    const resources = performance.getEntriesByType('resource');
    out.resources = {
        count: resources.length,
        totalDuration: resources.reduce((sum, r) => sum + r.duration, 0),
        totalTransferSize: resources.reduce((sum, r) => sum + (r.transferSize || 0), 0),
    };
    return JSON.stringify(out);
})()"#;

/// Navigate and collect performance metrics.
pub async fn performance(session: &mut CdpSession, url: &str) -> Result<Value> {
    session.command("Performance.enable", json!({})).await?;
    let summary = navigate(session, url, WaitUntil::NetworkIdle, DEFAULT_NAV_TIMEOUT_MS).await?;

    let metrics_result = session.command("Performance.getMetrics", json!({})).await?;
    let mut metrics = serde_json::Map::new();
    if let Some(items) = metrics_result.get("metrics").and_then(|v| v.as_array()) {
        for item in items {
            if let (Some(name), Some(value)) = (
                item.get("name").and_then(|v| v.as_str()),
                item.get("value"),
            ) {
                metrics.insert(name.to_string(), value.clone());
            }
        }
    }

    let timing = evaluate_json(session, PERFORMANCE_JS).await?;

    Ok(json!({
        "success": true,
        "url": summary.url,
        "metrics": metrics,
        "timing": timing,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_parses_known_values() {
        assert_eq!(
            "load".parse::<WaitUntil>().expect("parse"),
            WaitUntil::Load
        );
        assert_eq!(
            "networkidle2".parse::<WaitUntil>().expect("parse"),
            WaitUntil::NetworkIdle
        );
        assert!("eventually".parse::<WaitUntil>().is_err());
    }

    #[test]
    fn console_event_from_console_api_call() {
        let event = CdpEvent {
            method: "Runtime.consoleAPICalled".into(),
            params: json!({
                "type": "warning",
                "args": [
                    { "type": "string", "value": "deprecated" },
                    { "type": "number", "value": 42 }
                ]
            }),
        };
        let msg = console_event_to_message(&event).expect("should convert");
        assert_eq!(msg.kind, "warning");
        assert_eq!(msg.text, "deprecated 42");
    }

    #[test]
    fn console_event_from_exception() {
        let event = CdpEvent {
            method: "Runtime.exceptionThrown".into(),
            params: json!({
                "exceptionDetails": {
                    "text": "Uncaught",
                    "lineNumber": 10,
                    "exception": { "description": "ReferenceError: x is not defined" }
                }
            }),
        };
        let msg = console_event_to_message(&event).expect("should convert");
        assert_eq!(msg.kind, "pageerror");
        assert!(msg.text.contains("ReferenceError"));
        assert_eq!(msg.line, Some(10));
    }

    #[test]
    fn console_event_from_log_entry() {
        let event = CdpEvent {
            method: "Log.entryAdded".into(),
            params: json!({
                "entry": {
                    "level": "error",
                    "text": "Mixed content blocked",
                    "url": "https://example.com",
                    "lineNumber": 3
                }
            }),
        };
        let msg = console_event_to_message(&event).expect("should convert");
        assert_eq!(msg.kind, "error");
        assert_eq!(msg.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let event = CdpEvent {
            method: "Page.frameNavigated".into(),
            params: json!({}),
        };
        assert!(console_event_to_message(&event).is_none());
    }

    #[test]
    fn remote_object_rendering_prefers_value() {
        assert_eq!(
            render_remote_object(&json!({ "type": "string", "value": "hi" })),
            "hi"
        );
        assert_eq!(
            render_remote_object(&json!({ "type": "object", "description": "Window" })),
            "Window"
        );
        assert_eq!(render_remote_object(&json!({ "type": "undefined" })), "undefined");
    }

    #[test]
    fn screenshot_options_default_to_png_with_compression() {
        let opts = ScreenshotOptions::default();
        assert_eq!(opts.format, "png");
        assert!(!opts.no_compress);
        assert!((opts.max_size_mb - DEFAULT_SCREENSHOT_MAX_MB).abs() < f64::EPSILON);
    }
}
