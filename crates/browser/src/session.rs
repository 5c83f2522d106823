//! One throwaway Chrome process per probe.
//!
//! Each session gets its own profile directory and debugging port, talks CDP
//! to its first page target, and is torn down completely on close.

use async_trait::async_trait;
use campwatch_core::{Error, Paths, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cdp::{discover_page_target, free_local_port, CdpClient};
use crate::page::{BrowserLauncher, InputHint, LaunchOptions, ObservedResponse, PageDriver};
use crate::scripts;

/// Resource types that never "finish" and must not hold up network idle.
const STREAMING_TYPES: &[&str] = &["WebSocket", "EventSource"];

/// How long a fresh Chrome gets to expose its first page target.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Request bookkeeping fed from Network.* events.
#[derive(Debug)]
pub struct NetworkLog {
    inflight: HashSet<String>,
    last_activity: Instant,
    responses: Vec<ObservedResponse>,
}

impl NetworkLog {
    pub fn new() -> Self {
        Self {
            inflight: HashSet::new(),
            last_activity: Instant::now(),
            responses: Vec::new(),
        }
    }

    pub fn request_started(&mut self, params: &Value) {
        let resource_type = params.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if STREAMING_TYPES.contains(&resource_type) {
            return;
        }
        if let Some(id) = params.get("requestId").and_then(|v| v.as_str()) {
            self.inflight.insert(id.to_string());
            self.last_activity = Instant::now();
        }
    }

    pub fn request_done(&mut self, params: &Value) {
        if let Some(id) = params.get("requestId").and_then(|v| v.as_str()) {
            if self.inflight.remove(id) {
                self.last_activity = Instant::now();
            }
        }
    }

    pub fn response_received(&mut self, params: &Value) {
        let Some(request_id) = params.get("requestId").and_then(|v| v.as_str()) else {
            return;
        };
        let response = params.get("response").cloned().unwrap_or(Value::Null);
        self.responses.push(ObservedResponse {
            request_id: request_id.to_string(),
            url: response
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            status: response.get("status").and_then(|v| v.as_u64()).unwrap_or(0) as u16,
            mime_type: response
                .get("mimeType")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        });
    }

    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_idle(&self, quiet: Duration) -> bool {
        self.inflight.is_empty() && self.last_activity.elapsed() >= quiet
    }

    pub fn responses(&self) -> &[ObservedResponse] {
        &self.responses
    }
}

impl Default for NetworkLog {
    fn default() -> Self {
        Self::new()
    }
}

struct NetworkEvents {
    started: UnboundedReceiver<Value>,
    finished: UnboundedReceiver<Value>,
    failed: UnboundedReceiver<Value>,
    responses: UnboundedReceiver<Value>,
}

impl NetworkEvents {
    fn subscribe(cdp: &CdpClient) -> Self {
        Self {
            started: cdp.subscribe("Network.requestWillBeSent"),
            finished: cdp.subscribe("Network.loadingFinished"),
            failed: cdp.subscribe("Network.loadingFailed"),
            responses: cdp.subscribe("Network.responseReceived"),
        }
    }

    fn drain_into(&mut self, log: &mut NetworkLog) {
        while let Ok(p) = self.started.try_recv() {
            log.request_started(&p);
        }
        while let Ok(p) = self.responses.try_recv() {
            log.response_received(&p);
        }
        while let Ok(p) = self.finished.try_recv() {
            log.request_done(&p);
        }
        while let Ok(p) = self.failed.try_recv() {
            log.request_done(&p);
        }
    }
}

/// A live Chrome process plus its CDP connection.
pub struct BrowserSession {
    pub debug_port: u16,
    chrome_process: Child,
    cdp: CdpClient,
    profile_dir: PathBuf,
    events: NetworkEvents,
    network: NetworkLog,
    closed: bool,
}

impl BrowserSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let browser_path = match &options.executable {
            Some(path) => path.display().to_string(),
            None => find_browser_binary()
                .ok_or_else(|| Error::Browser("Chrome/Chromium not found. Please install it.".into()))?,
        };

        let profile_dir = Paths::browser_profile_dir(&uuid::Uuid::new_v4().simple().to_string());
        std::fs::create_dir_all(&profile_dir)?;

        let debug_port = free_local_port().await?;
        let args = build_browser_args(debug_port, &profile_dir, options);

        info!(
            port = debug_port,
            headless = options.headless,
            browser = %browser_path,
            "Launching browser"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", browser_path, e)))?;

        // From here on the process exists; a failed handshake must still clean up.
        match Self::connect(child, debug_port, profile_dir.clone(), options).await {
            Ok(session) => Ok(session),
            Err((mut child, e)) => {
                let _ = child.kill().await;
                remove_profile_dir(&profile_dir);
                Err(e)
            }
        }
    }

    async fn connect(
        child: Child,
        debug_port: u16,
        profile_dir: PathBuf,
        options: &LaunchOptions,
    ) -> std::result::Result<Self, (Child, Error)> {
        let handshake = async {
            let ws_url = discover_page_target(debug_port, STARTUP_TIMEOUT).await?;
            let cdp = CdpClient::connect(&ws_url).await?;
            // Subscribe before Network.enable so no request goes unseen.
            let events = NetworkEvents::subscribe(&cdp);
            for domain in ["Page", "Runtime", "Network"] {
                cdp.enable(domain).await?;
            }
            cdp.emulate(&options.user_agent, options.window_width, options.window_height)
                .await?;
            debug!(ws_url = %ws_url, "Attached to page target");
            Ok::<_, Error>((cdp, events))
        };

        match handshake.await {
            Ok((cdp, events)) => Ok(Self {
                debug_port,
                chrome_process: child,
                cdp,
                profile_dir,
                events,
                network: NetworkLog::new(),
                closed: false,
            }),
            Err(e) => Err((child, e)),
        }
    }

    fn sync_network(&mut self) {
        self.events.drain_into(&mut self.network);
    }

    async fn eval(&self, expression: &str) -> Result<Value> {
        self.cdp.evaluate(expression).await
    }

    async fn eval_strings(&self, expression: &str) -> Result<Vec<String>> {
        let value = self.eval(expression).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn eval_flag(&self, expression: &str, what: &str) -> Result<()> {
        match self.eval(expression).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(Error::Script(format!("{} not found", what))),
        }
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.cdp.navigate(url).await
    }

    async fn wait_for_network_idle(&mut self, quiet: Duration) -> Result<()> {
        loop {
            self.sync_network();
            if self.network.is_idle(quiet) {
                return Ok(());
            }
            debug!(inflight = self.network.inflight(), "Waiting for network idle");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        self.eval_strings(&scripts::element_texts(selector)).await
    }

    async fn click_element(&mut self, selector: &str, index: usize) -> Result<()> {
        let what = format!("element #{} of '{}'", index, selector);
        self.eval_flag(&scripts::click_element(selector, index), &what).await
    }

    async fn input_hints(&mut self, selector: &str) -> Result<Vec<InputHint>> {
        let value = self.eval(&scripts::input_hints(selector)).await?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn set_input_value(&mut self, selector: &str, index: usize, value: &str) -> Result<()> {
        let what = format!("input #{} of '{}'", index, selector);
        self.eval_flag(&scripts::set_input_value(selector, index, value), &what)
            .await
    }

    async fn text_nodes(&mut self) -> Result<Vec<String>> {
        self.eval_strings(scripts::TEXT_NODES).await
    }

    async fn body_text(&mut self) -> Result<String> {
        let value = self.eval(scripts::BODY_TEXT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn content(&mut self) -> Result<String> {
        let value = self.eval(scripts::OUTER_HTML).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot_full_page(&mut self) -> Result<Vec<u8>> {
        self.cdp.capture_full_page().await
    }

    async fn observed_responses(&mut self) -> Result<Vec<ObservedResponse>> {
        self.sync_network();
        Ok(self.network.responses().to_vec())
    }

    async fn response_body(&mut self, request_id: &str) -> Result<String> {
        self.cdp.response_body(request_id).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.cdp.call("Browser.close", serde_json::json!({})).await {
            debug!(error = %e, "Browser.close not acknowledged");
        }
        let _ = self.chrome_process.kill().await;
        remove_profile_dir(&self.profile_dir);
        debug!(port = self.debug_port, "Browser session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.chrome_process.start_kill();
            remove_profile_dir(&self.profile_dir);
        }
    }
}

/// Launches a real Chrome for every probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>> {
        let session = BrowserSession::launch(options).await?;
        Ok(Box::new(session))
    }
}

fn remove_profile_dir(dir: &Path) {
    if let Err(e) = std::fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %dir.display(), error = %e, "Failed to remove browser profile");
        }
    }
}

fn build_browser_args(debug_port: u16, profile_dir: &Path, options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--metrics-recording-only".to_string(),
        "--password-store=basic".to_string(),
        format!("--user-agent={}", options.user_agent),
        format!("--window-size={},{}", options.window_width, options.window_height),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

#[cfg(target_os = "macos")]
const BROWSER_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

#[cfg(target_os = "windows")]
const BROWSER_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    "chrome",
    "msedge",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
    "brave-browser",
];

/// First Chromium-family browser found, by absolute path or on PATH.
pub fn find_browser_binary() -> Option<String> {
    BROWSER_CANDIDATES.iter().find_map(|candidate| {
        let path = Path::new(candidate);
        if path.is_absolute() {
            path.exists().then(|| candidate.to_string())
        } else {
            which::which(candidate)
                .ok()
                .map(|found| found.display().to_string())
        }
    })
}
