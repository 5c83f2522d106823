//! The seam between probe logic and a live browser.
//!
//! Element lookups are index based: `element_texts(sel)` returns the visible
//! text of every match of `sel` in document order, and `click_element(sel, i)`
//! acts on the i-th match. Matching policy stays on the Rust side.

use async_trait::async_trait;
use campwatch_core::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Descriptive attributes of an `<input>`, used to guess what it is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputHint {
    pub name: String,
    pub id: String,
    pub placeholder: String,
    pub aria_label: String,
    /// Text of the associated or wrapping `<label>`.
    pub label: String,
    /// Nearby text (previous sibling, else parent). Shared by sibling inputs,
    /// so it only breaks ties.
    pub context: String,
    pub input_type: String,
}

/// A network response seen during the page's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
}

#[async_trait]
pub trait PageDriver: Send {
    /// Start loading `url`. Returns once the navigation is committed.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Block until no request has been in flight for `quiet`.
    /// No timeout of its own; callers bound it.
    async fn wait_for_network_idle(&mut self, quiet: Duration) -> Result<()>;

    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>>;

    async fn click_element(&mut self, selector: &str, index: usize) -> Result<()>;

    async fn input_hints(&mut self, selector: &str) -> Result<Vec<InputHint>>;

    /// Set a value so framework listeners notice: native setter, then
    /// `input` and `change` events.
    async fn set_input_value(&mut self, selector: &str, index: usize, value: &str) -> Result<()>;

    /// Non-blank text nodes under `<body>`, trimmed, in document order.
    async fn text_nodes(&mut self) -> Result<Vec<String>>;

    async fn body_text(&mut self) -> Result<String>;

    /// Serialized DOM.
    async fn content(&mut self) -> Result<String>;

    /// PNG bytes of the full document.
    async fn screenshot_full_page(&mut self) -> Result<Vec<u8>>;

    async fn observed_responses(&mut self) -> Result<Vec<ObservedResponse>>;

    async fn response_body(&mut self, request_id: &str) -> Result<String>;

    /// Tear the session down. Must be safe to call on a half-broken session.
    async fn close(&mut self);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>>;
}
