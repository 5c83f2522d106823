//! In-memory page driver for tests.

use async_trait::async_trait;
use campwatch_browser::{BrowserLauncher, InputHint, LaunchOptions, ObservedResponse, PageDriver};
use campwatch_core::{Error, Result};
use scraper::{Html, Node};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavigateBehavior {
    #[default]
    Load,
    Hang,
    Fail,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub html: String,
    pub elements: HashMap<String, Vec<String>>,
    pub inputs: Vec<InputHint>,
    pub responses: Vec<ObservedResponse>,
    pub bodies: HashMap<String, String>,
    pub navigate: NavigateBehavior,
    pub fail_screenshot: bool,
    pub navigated: Vec<String>,
    pub clicks: Vec<(String, usize)>,
    pub values: Vec<(String, usize, String)>,
    pub screenshots: usize,
    pub closed: bool,
    pub closes: usize,
}

#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<FakeState>>,
}

impl FakePage {
    pub fn state(&self) -> Arc<Mutex<FakeState>> {
        self.state.clone()
    }

    pub fn with_html(self, html: &str) -> Self {
        self.state.lock().unwrap().html = html.to_string();
        self
    }

    pub fn with_elements(self, selector: &str, texts: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_inputs(self, inputs: Vec<InputHint>) -> Self {
        self.state.lock().unwrap().inputs = inputs;
        self
    }

    pub fn with_response(self, response: ObservedResponse, body: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.bodies.insert(response.request_id.clone(), body.to_string());
            s.responses.push(response);
        }
        self
    }

    pub fn with_navigate(self, behavior: NavigateBehavior) -> Self {
        self.state.lock().unwrap().navigate = behavior;
        self
    }

    fn html(&self) -> String {
        self.state.lock().unwrap().html.clone()
    }
}

fn text_nodes_of(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.tree
        .nodes()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let parent_is_code = node
                .parent()
                .and_then(|p| p.value().as_element())
                .map(|el| matches!(el.name(), "script" | "style"))
                .unwrap_or(false);
            let t = text.trim();
            (!parent_is_code && !t.is_empty()).then(|| t.to_string())
        })
        .collect()
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let behavior = {
            let mut s = self.state.lock().unwrap();
            s.navigated.push(url.to_string());
            s.navigate
        };
        match behavior {
            NavigateBehavior::Load => Ok(()),
            NavigateBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            NavigateBehavior::Fail => Err(Error::Navigation("net::ERR_NAME_NOT_RESOLVED".into())),
        }
    }

    async fn wait_for_network_idle(&mut self, quiet: Duration) -> Result<()> {
        tokio::time::sleep(quiet).await;
        Ok(())
    }

    async fn element_texts(&mut self, selector: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn click_element(&mut self, selector: &str, index: usize) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        let exists = s.elements.get(selector).map(|e| index < e.len()).unwrap_or(false);
        if !exists {
            return Err(Error::Script(format!("element #{} of '{}' not found", index, selector)));
        }
        s.clicks.push((selector.to_string(), index));
        Ok(())
    }

    async fn input_hints(&mut self, _selector: &str) -> Result<Vec<InputHint>> {
        Ok(self.state.lock().unwrap().inputs.clone())
    }

    async fn set_input_value(&mut self, selector: &str, index: usize, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .values
            .push((selector.to_string(), index, value.to_string()));
        Ok(())
    }

    async fn text_nodes(&mut self) -> Result<Vec<String>> {
        Ok(text_nodes_of(&self.html()))
    }

    async fn body_text(&mut self) -> Result<String> {
        Ok(text_nodes_of(&self.html()).join("\n"))
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.html())
    }

    async fn screenshot_full_page(&mut self) -> Result<Vec<u8>> {
        let mut s = self.state.lock().unwrap();
        if s.fail_screenshot {
            return Err(Error::Browser("capture failed".into()));
        }
        s.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn observed_responses(&mut self) -> Result<Vec<ObservedResponse>> {
        Ok(self.state.lock().unwrap().responses.clone())
    }

    async fn response_body(&mut self, request_id: &str) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .bodies
            .get(request_id)
            .cloned()
            .ok_or_else(|| Error::Browser(format!("no body for {}", request_id)))
    }

    async fn close(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.closed = true;
        s.closes += 1;
    }
}

/// Hands out the same fake page on every launch.
pub struct FakeLauncher {
    pub page: FakePage,
    pub fail: bool,
    pub launches: Arc<Mutex<usize>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            fail: false,
            launches: Arc::new(Mutex::new(0)),
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn PageDriver>> {
        *self.launches.lock().unwrap() += 1;
        if self.fail {
            return Err(Error::Browser("Chrome/Chromium not found".into()));
        }
        Ok(Box::new(self.page.clone()))
    }
}
