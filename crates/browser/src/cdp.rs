//! Chrome DevTools Protocol over a WebSocket, scoped to one page target.
//!
//! Replies are matched to commands by id; events go to every subscriber of
//! their method name.

use base64::Engine;
use campwatch_core::{Error, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Per-command reply deadline.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Where incoming frames go.
#[derive(Default)]
struct Router {
    replies: HashMap<u64, oneshot::Sender<Value>>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    /// Set once the socket is gone; no reply can arrive after that.
    disconnected: bool,
}

impl Router {
    /// Fail every outstanding call and refuse new ones.
    fn disconnect(&mut self) {
        self.disconnected = true;
        self.replies.clear();
        self.subscribers.clear();
    }

    fn route(&mut self, frame: Value) {
        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            if let Some(reply) = self.replies.remove(&id) {
                let _ = reply.send(frame);
            }
            return;
        }
        let Some(method) = frame.get("method").and_then(Value::as_str) else {
            return;
        };
        if let Some(subs) = self.subscribers.get_mut(method) {
            let params = frame.get("params").cloned().unwrap_or(Value::Null);
            subs.retain(|tx| tx.send(params.clone()).is_ok());
        }
    }
}

fn lock(router: &Mutex<Router>) -> std::sync::MutexGuard<'_, Router> {
    router.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct CdpClient {
    outgoing: mpsc::Sender<String>,
    router: Arc<Mutex<Router>>,
    next_id: AtomicU64,
    tasks: [JoinHandle<()>; 2],
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| Error::Browser(format!("CDP connect to {} failed: {}", ws_url, e)))?;
        let (mut sink, mut source) = stream.split();
        let (outgoing, mut queue) = mpsc::channel::<String>(256);
        let router = Arc::new(Mutex::new(Router::default()));

        let writer = tokio::spawn(async move {
            while let Some(text) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!(error = %e, "CDP write failed");
                    break;
                }
            }
        });

        let inbound = router.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => lock(&inbound).route(value),
                        Err(e) => debug!(error = %e, "Unparsable CDP frame"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("CDP socket closed by browser");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "CDP read failed");
                        break;
                    }
                }
            }
            lock(&inbound).disconnect();
        });

        Ok(Self {
            outgoing,
            router,
            next_id: AtomicU64::new(1),
            tasks: [writer, reader],
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut router = lock(&self.router);
            if router.disconnected {
                return Err(Error::Browser(format!("{}: CDP connection is closed", method)));
            }
            router.replies.insert(id, tx);
        }

        let frame = json!({"id": id, "method": method, "params": params}).to_string();
        if self.outgoing.send(frame).await.is_err() {
            lock(&self.router).replies.remove(&id);
            return Err(Error::Browser(format!("{}: CDP connection is gone", method)));
        }

        let reply = match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(Error::Browser(format!("{}: CDP connection dropped", method))),
            Err(_) => {
                lock(&self.router).replies.remove(&id);
                return Err(Error::Timeout(format!(
                    "{} got no reply within {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )));
            }
        };
        match reply.get("error") {
            Some(err) => Err(Error::Browser(format!("{} rejected: {}", method, err))),
            None => Ok(reply.get("result").cloned().unwrap_or(Value::Null)),
        }
    }

    /// Unbounded, so bursts of network events are never lost.
    pub fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.router)
            .subscribers
            .entry(method.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn enable(&self, domain: &str) -> Result<()> {
        self.call(&format!("{}.enable", domain), json!({})).await.map(drop)
    }

    /// Starts loading `url`. DNS and connection failures surface here.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.call("Page.navigate", json!({ "url": url })).await?;
        match result.get("errorText").and_then(Value::as_str) {
            Some(err) if !err.is_empty() => Err(Error::Navigation(format!("{}: {}", url, err))),
            _ => Ok(()),
        }
    }

    /// Value of `expression`, awaiting promises. A thrown exception is an error.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({"expression": expression, "returnByValue": true, "awaitPromise": true}),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("exception without description");
            return Err(Error::Script(message.to_string()));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    /// PNG of the full document height.
    pub async fn capture_full_page(&self) -> Result<Vec<u8>> {
        let metrics = self.call("Page.getLayoutMetrics", json!({})).await?;
        let mut params = json!({"format": "png", "captureBeyondViewport": true});
        if let Some(clip) = full_page_clip(&metrics) {
            params["clip"] = clip;
        }
        let shot = self.call("Page.captureScreenshot", params).await?;
        let data = shot
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Browser("captureScreenshot returned no data".into()))?;
        decode_base64(data)
    }

    pub async fn emulate(&self, user_agent: &str, width: u32, height: u32) -> Result<()> {
        self.call(
            "Network.setUserAgentOverride",
            json!({"userAgent": user_agent, "acceptLanguage": "en-US,en"}),
        )
        .await?;
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({"width": width, "height": height, "deviceScaleFactor": 1, "mobile": false}),
        )
        .await
        .map(drop)
    }

    pub async fn response_body(&self, request_id: &str) -> Result<String> {
        let result = self
            .call("Network.getResponseBody", json!({ "requestId": request_id }))
            .await?;
        let body = result.get("body").and_then(Value::as_str).unwrap_or_default();
        if result.get("base64Encoded").and_then(Value::as_bool) == Some(true) {
            Ok(String::from_utf8_lossy(&decode_base64(body)?).into_owned())
        } else {
            Ok(body.to_string())
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| Error::Browser(format!("bad base64 from browser: {}", e)))
}

/// Clip covering the whole content box, if the browser reported one.
fn full_page_clip(metrics: &Value) -> Option<Value> {
    let size = metrics.get("cssContentSize").or_else(|| metrics.get("contentSize"))?;
    let width = size.get("width").and_then(Value::as_f64)?;
    let height = size.get("height").and_then(Value::as_f64)?;
    (width > 0.0 && height > 0.0).then(|| {
        json!({"x": 0, "y": 0, "width": width.ceil(), "height": height.ceil(), "scale": 1})
    })
}

/// WebSocket URL of the first page target in a `/json/list` answer.
pub fn pick_page_target(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(Value::as_str) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(Value::as_str))
        .map(str::to_string)
}

/// Poll the debugging endpoint on `port` until a page target shows up.
pub async fn discover_page_target(port: u16, within: Duration) -> Result<String> {
    let list_url = format!("http://127.0.0.1:{}/json/list", port);
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Ok(resp) = reqwest::get(&list_url).await {
            if let Ok(targets) = resp.json::<Vec<Value>>().await {
                if let Some(ws) = pick_page_target(&targets) {
                    return Ok(ws);
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::Browser(format!(
                "no page target on debugging port {} after {}s",
                port,
                within.as_secs()
            )));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// An unused localhost port for `--remote-debugging-port`.
pub async fn free_local_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_replies_by_id() {
        let mut router = Router::default();
        let (tx, mut rx) = oneshot::channel();
        router.replies.insert(7, tx);

        router.route(json!({"id": 3, "result": {}}));
        assert!(rx.try_recv().is_err());

        router.route(json!({"id": 7, "result": {"ok": true}}));
        assert_eq!(rx.try_recv().unwrap()["result"]["ok"], true);
        assert!(router.replies.is_empty());
    }

    #[test]
    fn test_router_fans_out_events_and_drops_dead_subscribers() {
        let mut router = Router::default();
        let (live, mut live_rx) = mpsc::unbounded_channel();
        let (dead, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        router
            .subscribers
            .insert("Network.loadingFinished".into(), vec![live, dead]);

        router.route(json!({"method": "Network.loadingFinished", "params": {"requestId": "9"}}));
        router.route(json!({"method": "Page.loadEventFired", "params": {}}));

        assert_eq!(live_rx.try_recv().unwrap()["requestId"], "9");
        assert!(live_rx.try_recv().is_err());
        assert_eq!(router.subscribers["Network.loadingFinished"].len(), 1);
    }

    #[test]
    fn test_disconnect_fails_pending_replies() {
        let mut router = Router::default();
        let (tx, mut rx) = oneshot::channel();
        router.replies.insert(1, tx);

        router.disconnect();

        assert!(router.disconnected);
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn test_closed_socket_fails_fast() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = ws.close(None).await;
        });

        let client = CdpClient::connect(&format!("ws://{}", addr)).await.unwrap();
        let started = std::time::Instant::now();
        for _ in 0..2 {
            let result = tokio::time::timeout(
                Duration::from_secs(5),
                client.call("Runtime.evaluate", json!({"expression": "1"})),
            )
            .await
            .expect("call must not wait for the command timeout");
            assert!(matches!(result, Err(Error::Browser(_))), "{:?}", result);
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        server.await.unwrap();
    }

    #[test]
    fn test_pick_page_target_skips_workers() {
        let targets = vec![
            json!({"type": "service_worker", "webSocketDebuggerUrl": "ws://sw"}),
            json!({"type": "page"}),
            json!({"type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A"}),
        ];
        assert_eq!(
            pick_page_target(&targets).as_deref(),
            Some("ws://127.0.0.1:9222/devtools/page/A")
        );
        assert!(pick_page_target(&[]).is_none());
    }

    #[test]
    fn test_full_page_clip() {
        let clip = full_page_clip(&json!({"cssContentSize": {"width": 1280.0, "height": 4210.5}})).unwrap();
        assert_eq!(clip["height"], 4211.0);
        assert!(full_page_clip(&json!({"contentSize": {"width": 0.0, "height": 10.0}})).is_none());
        assert!(full_page_clip(&json!({})).is_none());
    }
}
