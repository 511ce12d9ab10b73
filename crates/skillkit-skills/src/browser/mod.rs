//! Browser automation over the Chrome DevTools Protocol.
//!
//! [`Browser`] is an explicitly scoped handle: it either attaches to an
//! already-running Chrome's remote debugging port or launches a headless
//! instance itself, and it owns that child for its whole life.  Callers
//! create the handle, run operations through a [`CdpSession`], and call
//! [`Browser::close`]; if they forget, the launched child is still killed
//! on drop.  There is no process-wide singleton.
//!
//! A [`CdpSession`] is a WebSocket connection to one page target.  Commands
//! are JSON messages matched to responses by a monotonically increasing id;
//! protocol events arriving in between can be drained separately (used by
//! console monitoring).

pub mod actions;
pub mod selector;

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::{Result, SkillError};

/// Default Chrome DevTools Protocol debug port.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// Timeout for CDP WebSocket operations in seconds.
const CDP_TIMEOUT_SECS: u64 = 30;

/// Timeout for HTTP requests to the DevTools endpoint in seconds.
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Timeout waiting for Chrome to start up in seconds.
const CHROME_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Maximum CDP response size in bytes (20 MB; screenshots arrive as base64).
const MAX_CDP_RESPONSE_BYTES: usize = 20 * 1024 * 1024;

/// Maximum protocol events buffered while a command response is pending.
const MAX_BUFFERED_EVENTS: usize = 10_000;

/// Options controlling how the browser handle is obtained.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Remote debugging port to attach to or launch with.
    pub debug_port: u16,
    /// Explicit Chrome/Chromium executable; auto-detected when `None`.
    pub chrome_path: Option<String>,
    /// Launch with `--headless=new` (on by default).
    pub headless: bool,
    /// Viewport width passed via `--window-size`.
    pub window_width: u32,
    /// Viewport height passed via `--window-size`.
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            debug_port: DEFAULT_DEBUG_PORT,
            chrome_path: None,
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// A scoped handle to a Chrome instance reachable over CDP.
pub struct Browser {
    debug_port: u16,
    client: reqwest::Client,
    /// The Chrome child process when this handle launched it; `None` when
    /// attached to an external browser (which is never killed on close).
    child: Option<tokio::process::Child>,
}

impl Browser {
    /// Attach to a reachable DevTools endpoint, or launch Chrome and wait
    /// for it to come up.
    pub async fn connect(opts: &BrowserOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("skillkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        let mut browser = Self {
            debug_port: opts.debug_port,
            client,
            child: None,
        };

        if browser.is_devtools_reachable().await {
            info!(port = opts.debug_port, "attached to running Chrome");
            return Ok(browser);
        }

        browser.launch_chrome(opts).await?;
        Ok(browser)
    }

    /// Close the handle, terminating Chrome if this handle launched it.
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            debug!("terminating launched Chrome");
            // start_kill + wait avoids leaving a zombie; kill_on_drop is the
            // backstop when close() is never reached.
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        Ok(())
    }

    /// Open a CDP session on the first available page target.
    pub async fn page_session(&self) -> Result<CdpSession> {
        let ws_url = self.first_page_ws_url().await?;
        CdpSession::connect(&ws_url).await
    }

    fn devtools_base_url(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }

    async fn is_devtools_reachable(&self) -> bool {
        let url = format!("{}/json/version", self.devtools_base_url());
        self.client.get(&url).send().await.is_ok()
    }

    async fn launch_chrome(&mut self, opts: &BrowserOptions) -> Result<()> {
        let chrome_path = find_chrome_path(opts.chrome_path.as_deref())?;

        info!(
            chrome_path = %chrome_path,
            port = self.debug_port,
            headless = opts.headless,
            "launching Chrome with remote debugging"
        );

        let mut cmd = tokio::process::Command::new(&chrome_path);
        cmd.arg(format!("--remote-debugging-port={}", self.debug_port))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!(
                "--window-size={},{}",
                opts.window_width, opts.window_height
            ))
            .arg("about:blank")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        if opts.headless {
            cmd.arg("--headless=new");
        }

        let child = cmd.spawn().map_err(|e| SkillError::ExecutionFailed {
            skill: "browser".into(),
            reason: format!("failed to launch Chrome at `{chrome_path}`: {e}"),
        })?;
        self.child = Some(child);

        // Wait for the DevTools endpoint to become reachable.
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(CHROME_STARTUP_TIMEOUT_SECS);
        loop {
            if self.is_devtools_reachable().await {
                info!("Chrome DevTools endpoint is reachable");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SkillError::Timeout {
                    seconds: CHROME_STARTUP_TIMEOUT_SECS,
                    reason: "Chrome did not start in time".into(),
                });
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// WebSocket debugger URL of the first page target.
    async fn first_page_ws_url(&self) -> Result<String> {
        let url = format!("{}/json", self.devtools_base_url());
        let targets: Vec<Value> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: format!("failed to list DevTools targets: {e}"),
            })?
            .json()
            .await
            .map_err(|e| SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: format!("failed to parse target list: {e}"),
            })?;

        let page = targets
            .into_iter()
            .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
            .ok_or_else(|| SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: "no page targets available in Chrome".into(),
            })?;

        page.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: "page target has no webSocketDebuggerUrl".into(),
            })
    }
}

/// Locate the Chrome/Chromium executable.
pub fn find_chrome_path(explicit: Option<&str>) -> Result<String> {
    if let Some(path) = explicit {
        return Ok(path.to_string());
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ]
    } else {
        &[]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() || which_exists(candidate) {
            return Ok((*candidate).to_string());
        }
    }

    Err(SkillError::ToolMissing {
        tool: "chrome".into(),
        hint: "install Chrome/Chromium or pass --chrome-path".into(),
    })
}

/// Check whether a command exists on the system PATH (best-effort).
fn which_exists(name: &str) -> bool {
    std::process::Command::new("which")
        .arg(name)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// A protocol event received while waiting on a command response.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub params: Value,
}

/// One WebSocket connection to a page target.
pub struct CdpSession {
    sink: WsSink,
    stream: WsStream,
    next_id: u64,
    /// Events received while a command response was pending, drained by
    /// [`collect_events`](Self::collect_events).
    pending_events: VecDeque<CdpEvent>,
}

impl CdpSession {
    async fn connect(ws_url: &str) -> Result<Self> {
        debug!(ws_url = %ws_url, "opening CDP session");

        let (ws_stream, _response) = tokio::time::timeout(
            Duration::from_secs(CDP_TIMEOUT_SECS),
            connect_async(ws_url),
        )
        .await
        .map_err(|_| SkillError::Timeout {
            seconds: CDP_TIMEOUT_SECS,
            reason: format!("WebSocket connection to `{ws_url}` timed out"),
        })?
        .map_err(|e| SkillError::ExecutionFailed {
            skill: "browser".into(),
            reason: format!("WebSocket connection failed: {e}"),
        })?;

        let (sink, stream) = ws_stream.split();
        Ok(Self {
            sink,
            stream,
            next_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    /// Send a CDP command and wait for its matching response.
    ///
    /// Events arriving before the response are buffered and handed out by
    /// [`collect_events`](Self::collect_events), so console messages fired
    /// while a navigation command is in flight are not lost.
    pub async fn command(&mut self, method: &str, params: Value) -> Result<Value> {
        self.command_with_timeout(method, params, CDP_TIMEOUT_SECS)
            .await
    }

    /// Send a CDP command with an explicit response timeout.
    pub async fn command_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        timeout_secs: u64,
    ) -> Result<Value> {
        let msg_id = self.next_id;
        self.next_id += 1;

        debug!(method = method, msg_id = msg_id, "sending CDP command");

        let message = json!({ "id": msg_id, "method": method, "params": params });
        let text = serde_json::to_string(&message)?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: format!("failed to send CDP message: {e}"),
            })?;

        let stream = &mut self.stream;
        let pending = &mut self.pending_events;
        tokio::time::timeout(Duration::from_secs(timeout_secs), async move {
            while let Some(msg_result) = stream.next().await {
                let msg = msg_result.map_err(|e| SkillError::ExecutionFailed {
                    skill: "browser".into(),
                    reason: format!("WebSocket receive error: {e}"),
                })?;

                match msg {
                    Message::Text(text) => {
                        if text.len() > MAX_CDP_RESPONSE_BYTES {
                            return Err(SkillError::ExecutionFailed {
                                skill: "browser".into(),
                                reason: format!(
                                    "CDP response too large: {} bytes (max {})",
                                    text.len(),
                                    MAX_CDP_RESPONSE_BYTES
                                ),
                            });
                        }

                        let response: Value = serde_json::from_str(&text)?;
                        if response.get("id").and_then(|v| v.as_u64()) == Some(msg_id) {
                            if let Some(error) = response.get("error") {
                                let message = error
                                    .get("message")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("unknown CDP error");
                                return Err(SkillError::ExecutionFailed {
                                    skill: "browser".into(),
                                    reason: format!("CDP error: {message}"),
                                });
                            }
                            return Ok(response.get("result").cloned().unwrap_or(json!({})));
                        }
                        // Buffer events for collect_events; drop stale responses.
                        if let Some(event_method) =
                            response.get("method").and_then(|m| m.as_str())
                        {
                            if pending.len() < MAX_BUFFERED_EVENTS {
                                pending.push_back(CdpEvent {
                                    method: event_method.to_string(),
                                    params: response
                                        .get("params")
                                        .cloned()
                                        .unwrap_or(json!({})),
                                });
                            }
                        }
                    }
                    Message::Close(_) => {
                        return Err(SkillError::ExecutionFailed {
                            skill: "browser".into(),
                            reason: "WebSocket closed before receiving CDP response".into(),
                        });
                    }
                    // Ignore ping, pong, binary frames.
                    _ => {}
                }
            }

            Err(SkillError::ExecutionFailed {
                skill: "browser".into(),
                reason: "WebSocket stream ended without CDP response".into(),
            })
        })
        .await
        .map_err(|_| SkillError::Timeout {
            seconds: timeout_secs,
            reason: format!("waiting for CDP response to `{method}`"),
        })?
    }

    /// Read protocol events for `duration`, returning every event received.
    ///
    /// Starts with the events buffered during earlier commands, then reads
    /// the socket until the deadline.  Applies after enabling the relevant
    /// domains (e.g. `Runtime.enable`).
    pub async fn collect_events(&mut self, duration: Duration) -> Result<Vec<CdpEvent>> {
        let mut events: Vec<CdpEvent> = self.pending_events.drain(..).collect();
        let deadline = tokio::time::Instant::now() + duration;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            let next = tokio::time::timeout(remaining, self.stream.next()).await;
            match next {
                Ok(Some(Ok(Message::Text(text)))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
                        events.push(CdpEvent {
                            method: method.to_string(),
                            params: value.get("params").cloned().unwrap_or(json!({})),
                        });
                    }
                }
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "WebSocket error while collecting events");
                    break;
                }
                Ok(None) => break,
                Err(_) => break, // deadline reached
            }
        }

        Ok(events)
    }

    /// Close the session cleanly (best-effort).
    pub async fn close(mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_headless_on_default_port() {
        let opts = BrowserOptions::default();
        assert_eq!(opts.debug_port, DEFAULT_DEBUG_PORT);
        assert!(opts.headless);
        assert!(opts.chrome_path.is_none());
    }

    #[test]
    fn find_chrome_path_prefers_explicit() {
        let path = find_chrome_path(Some("/usr/bin/chromium")).expect("explicit path wins");
        assert_eq!(path, "/usr/bin/chromium");
    }

    #[tokio::test]
    async fn events_during_pending_command_survive_to_collect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");

        // A page target that fires a console event before answering the
        // command, the way a loading page does during Page.navigate.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws handshake");

            let frame = ws.next().await.expect("client frame").expect("ws read");
            let request: Value =
                serde_json::from_str(frame.to_text().expect("text frame")).expect("json");
            let id = request["id"].as_u64().expect("command id");

            let event = json!({
                "method": "Runtime.consoleAPICalled",
                "params": { "type": "log", "args": [{ "value": "loading" }] }
            });
            ws.send(Message::Text(event.to_string().into()))
                .await
                .expect("send event");
            ws.send(Message::Text(json!({ "id": id, "result": {} }).to_string().into()))
                .await
                .expect("send response");

            // Hold the socket open while the client drains its buffer.
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let mut session = CdpSession::connect(&format!("ws://{addr}"))
            .await
            .expect("connect");
        session
            .command("Runtime.enable", json!({}))
            .await
            .expect("command");

        let events = session
            .collect_events(Duration::from_millis(200))
            .await
            .expect("collect");
        assert!(
            events
                .iter()
                .any(|e| e.method == "Runtime.consoleAPICalled"),
            "event received during the in-flight command should be collected"
        );

        session.close().await;
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn connect_fails_fast_without_chrome() {
        // Port 1 is never a DevTools endpoint; with an explicit bogus chrome
        // path the launch fails instead of probing the system.
        let opts = BrowserOptions {
            debug_port: 1,
            chrome_path: Some("/nonexistent/chrome-binary".into()),
            ..BrowserOptions::default()
        };
        let result = Browser::connect(&opts).await;
        assert!(result.is_err());
    }
}
