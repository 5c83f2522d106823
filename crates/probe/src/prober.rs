//! One probe: fresh browser, load, filter, wait, capture, extract, close.

use async_trait::async_trait;
use campwatch_browser::{BrowserLauncher, LaunchOptions, PageDriver};
use campwatch_core::{Config, Error, Paths, ProbeResult, Result, SearchCriteria};
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::extract::{is_candidate_response, ApiPayload, Extractor, PageEvidence};
use crate::filters::apply_filters;
use crate::target::build_target_url;

pub type ProbeFailure = Error;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub booking_url: String,
    pub navigation_timeout: Duration,
    pub network_idle: Duration,
    pub settle_delay: Duration,
    pub results_wait: Duration,
    pub screenshot_dir: PathBuf,
    pub deep_inspection: bool,
    pub launch: LaunchOptions,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        let probe = &config.probe;
        Self {
            booking_url: probe.booking_url.clone(),
            navigation_timeout: Duration::from_secs(probe.navigation_timeout_secs),
            network_idle: Duration::from_millis(probe.network_idle_ms),
            settle_delay: Duration::from_secs(probe.settle_delay_secs),
            results_wait: Duration::from_secs(probe.results_wait_secs),
            screenshot_dir: probe.screenshot_dir(),
            deep_inspection: probe.deep_inspection,
            launch: LaunchOptions {
                executable: config.browser.executable.as_ref().map(PathBuf::from),
                headless: config.browser.headless,
                user_agent: probe.user_agent.clone(),
                window_width: config.browser.window_width,
                window_height: config.browser.window_height,
            },
        }
    }
}

#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    /// Never fails: a failed check is logged and reported as zero.
    async fn probe(&self, criteria: &SearchCriteria) -> ProbeResult;
}

pub struct Prober<L> {
    launcher: L,
    settings: ProbeSettings,
    extractor: Extractor,
}

impl<L: BrowserLauncher> Prober<L> {
    pub fn new(launcher: L, settings: ProbeSettings) -> Self {
        let extractor = Extractor::new(settings.deep_inspection);
        Self {
            launcher,
            settings,
            extractor,
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Run a probe and surface any failure. The session is closed on every
    /// path once it has been opened.
    pub async fn try_probe(&self, criteria: &SearchCriteria) -> Result<ProbeResult> {
        let target = build_target_url(&self.settings.booking_url, criteria)?;
        let mut page = self.launcher.launch(&self.settings.launch).await?;
        let outcome = self.drive(page.as_mut(), &target, criteria).await;
        page.close().await;
        outcome
    }

    async fn drive(
        &self,
        page: &mut dyn PageDriver,
        target: &Url,
        criteria: &SearchCriteria,
    ) -> Result<ProbeResult> {
        info!(url = %target, "Loading booking page");
        self.load(page, target).await?;
        tokio::time::sleep(self.settings.settle_delay).await;

        let applied = apply_filters(page, criteria).await?;
        debug!(?applied, "Filters done");

        info!(
            secs = self.settings.results_wait.as_secs(),
            "Waiting for results to render"
        );
        tokio::time::sleep(self.settings.results_wait).await;

        let screenshot = self.capture_screenshot(page).await;
        let evidence = self.gather_evidence(page, target).await?;

        let mut result = self.extractor.extract(&evidence);
        result.screenshot = screenshot;
        info!(
            count = result.count,
            sites = result.sites.len(),
            no_sites_notice = result.no_sites_notice,
            "Probe complete"
        );
        Ok(result)
    }

    /// Navigate and wait for the network to go quiet, within the hard
    /// page-load timeout.
    async fn load(&self, page: &mut dyn PageDriver, target: &Url) -> Result<()> {
        let idle = self.settings.network_idle;
        let nav = async {
            page.navigate(target.as_str()).await?;
            page.wait_for_network_idle(idle).await
        };
        match tokio::time::timeout(self.settings.navigation_timeout, nav).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "page load did not settle within {}s",
                self.settings.navigation_timeout.as_secs()
            ))),
        }
    }

    async fn capture_screenshot(&self, page: &mut dyn PageDriver) -> Option<PathBuf> {
        let bytes = match page.screenshot_full_page().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Screenshot failed");
                return None;
            }
        };
        let dir = &self.settings.screenshot_dir;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(path = %dir.display(), error = %e, "Cannot create screenshot directory");
            return None;
        }
        let path = Paths::screenshot_file(dir, Local::now());
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                info!(path = %path.display(), "Screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write screenshot");
                None
            }
        }
    }

    async fn gather_evidence(&self, page: &mut dyn PageDriver, target: &Url) -> Result<PageEvidence> {
        let mut evidence = PageEvidence {
            text_nodes: page.text_nodes().await?,
            ..Default::default()
        };
        if self.settings.deep_inspection {
            evidence.body_text = page.body_text().await?;
            evidence.html = page.content().await?;
            evidence.api_payloads = self.capture_api_payloads(page, target).await;
        }
        Ok(evidence)
    }

    async fn capture_api_payloads(&self, page: &mut dyn PageDriver, target: &Url) -> Vec<ApiPayload> {
        let responses = match page.observed_responses().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "No network log available");
                return Vec::new();
            }
        };

        let mut payloads = Vec::new();
        for response in responses.iter().filter(|r| is_candidate_response(r, target)) {
            let body = match page.response_body(&response.request_id).await {
                Ok(b) => b,
                Err(e) => {
                    debug!(url = %response.url, error = %e, "Response body unavailable");
                    continue;
                }
            };
            match serde_json::from_str(&body) {
                Ok(json) => payloads.push(ApiPayload {
                    url: response.url.clone(),
                    body: json,
                }),
                Err(e) => debug!(url = %response.url, error = %e, "Response is not JSON"),
            }
        }
        debug!(payloads = payloads.len(), "API payloads captured");
        payloads
    }
}

#[async_trait]
impl<L: BrowserLauncher> AvailabilityProbe for Prober<L> {
    async fn probe(&self, criteria: &SearchCriteria) -> ProbeResult {
        match self.try_probe(criteria).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Probe failed, reporting no availability");
                ProbeResult::not_found()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{ACTION_SELECTOR, RV_TYPE_SELECTOR};
    use crate::testing::{FakeLauncher, FakePage, NavigateBehavior};
    use campwatch_browser::ObservedResponse;
    use campwatch_core::SiteOrigin;

    fn settings(dir: &std::path::Path, deep: bool) -> ProbeSettings {
        let mut config = Config::default();
        config.probe.booking_url = "https://book.example.com/park".into();
        config.probe.screenshot_dir = Some(dir.display().to_string());
        config.probe.deep_inspection = deep;
        ProbeSettings::from_config(&config)
    }

    fn criteria(rv_type: Option<&str>) -> SearchCriteria {
        SearchCriteria::new(
            "2026-03-13".parse().unwrap(),
            "2026-03-14".parse().unwrap(),
            rv_type.map(String::from),
            None,
            2,
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_count_from_page_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html("<html><body><h2>Results</h2><p>3 Sites Available</p></body></html>");
        let state = page.state();
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let result = prober.try_probe(&criteria(None)).await.unwrap();

        assert_eq!(result.count, 3);
        let s = state.lock().unwrap();
        assert_eq!(
            s.navigated,
            vec!["https://book.example.com/park?checkin=2026-03-13&checkout=2026-03-14&adults=2".to_string()]
        );
        assert!(s.closed);
        assert_eq!(s.screenshots, 1);
        let shot = result.screenshot.unwrap();
        assert!(shot.starts_with(dir.path()));
        assert!(shot.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_session_per_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default().with_html("<p>4 sites available</p>");
        let state = page.state();
        let launcher = FakeLauncher::new(page);
        let launches = launcher.launches.clone();
        let prober = Prober::new(launcher, settings(dir.path(), false));

        assert_eq!(prober.probe(&criteria(None)).await.count, 4);
        assert_eq!(prober.probe(&criteria(None)).await.count, 4);

        assert_eq!(*launches.lock().unwrap(), 2);
        let s = state.lock().unwrap();
        assert_eq!(s.closes, 2);
        assert_eq!(s.navigated.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sites_text_is_zero_without_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html("<body><div>No sites available matching search criteria</div></body>");
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let result = prober.try_probe(&criteria(None)).await.unwrap();
        assert_eq!(result.count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_page_is_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default().with_html("<body><p>Loading…</p></body>");
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), true));

        let result = prober.try_probe(&criteria(None)).await.unwrap();
        assert_eq!(result.count, 0);
        assert!(!result.no_sites_notice);
        assert!(result.sites.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_timeout_is_handled_and_session_closed() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html("<p>3 Sites Available</p>")
            .with_navigate(NavigateBehavior::Hang);
        let state = page.state();
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let err = prober.try_probe(&criteria(None)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(state.lock().unwrap().closed);

        state.lock().unwrap().closed = false;
        let result = prober.probe(&criteria(None)).await;
        assert_eq!(result.count, 0);
        assert!(state.lock().unwrap().closed);
        assert_eq!(state.lock().unwrap().screenshots, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_is_handled() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default().with_navigate(NavigateBehavior::Fail);
        let state = page.state();
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let result = prober.probe(&criteria(None)).await;
        assert_eq!(result.count, 0);
        assert!(state.lock().unwrap().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_reports_zero() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut launcher = FakeLauncher::new(FakePage::default());
        launcher.fail = true;
        let prober = Prober::new(launcher, settings(dir.path(), false));

        assert!(matches!(prober.try_probe(&criteria(None)).await, Err(Error::Browser(_))));
        assert_eq!(prober.probe(&criteria(None)).await.count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_failure_is_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default().with_html("<p>2 sites available</p>");
        page.state().lock().unwrap().fail_screenshot = true;
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let result = prober.try_probe(&criteria(None)).await.unwrap();
        assert_eq!(result.count, 2);
        assert!(result.screenshot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rv_filter_clicked_once_and_submitted() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html("<p>1 site available</p>")
            .with_elements(RV_TYPE_SELECTOR, &["Tent", "Travel Trailer", "Motorhome"])
            .with_elements(ACTION_SELECTOR, &["Search"]);
        let state = page.state();
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), false));

        let result = prober.try_probe(&criteria(Some("travel trailer"))).await.unwrap();

        assert_eq!(result.count, 1);
        let s = state.lock().unwrap();
        assert_eq!(
            s.clicks,
            vec![(RV_TYPE_SELECTOR.to_string(), 1), (ACTION_SELECTOR.to_string(), 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deep_inspection_prefers_api_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html(
                r#"<body><p>2 Sites Available</p>
                <div class="site-card"><h3>Card Site</h3></div></body>"#,
            )
            .with_response(
                ObservedResponse {
                    request_id: "r1".into(),
                    url: "https://book.example.com/api/availability?checkin=2026-03-13".into(),
                    status: 200,
                    mime_type: "application/json".into(),
                },
                r#"{"sites": [{"name": "A1", "price": 40}, {"name": "A2"}]}"#,
            )
            .with_response(
                ObservedResponse {
                    request_id: "r2".into(),
                    url: "https://tracker.example.net/availability".into(),
                    status: 200,
                    mime_type: "application/json".into(),
                },
                r#"{"sites": [{"name": "ignored"}]}"#,
            );
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), true));

        let result = prober.try_probe(&criteria(None)).await.unwrap();

        assert_eq!(result.count, 2);
        assert_eq!(result.site_origin, Some(SiteOrigin::Api));
        let names: Vec<_> = result.sites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A1", "A2"]);
        assert_eq!(result.sites[0].price.as_deref(), Some("40"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_records_reported_without_count_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default()
            .with_html("<body><div id=\"app\">Results</div></body>")
            .with_response(
                ObservedResponse {
                    request_id: "r1".into(),
                    url: "https://book.example.com/api/availability".into(),
                    status: 200,
                    mime_type: "application/json".into(),
                },
                r#"{"sites": [{"name": "A1"}, {"name": "A2"}]}"#,
            );
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), true));

        let result = prober.try_probe(&criteria(None)).await.unwrap();

        assert_eq!(result.count, 2);
        assert!(result.is_available());
        assert_eq!(result.site_origin, Some(SiteOrigin::Api));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deep_inspection_falls_back_to_cards() {
        let dir = tempfile::TempDir::new().unwrap();
        let page = FakePage::default().with_html(
            r#"<body><p>1 site available</p><div class="site-card"><h3>Loop C 9</h3><span class="price">$60</span></div></body>"#,
        );
        let prober = Prober::new(FakeLauncher::new(page), settings(dir.path(), true));

        let result = prober.try_probe(&criteria(None)).await.unwrap();
        assert_eq!(result.site_origin, Some(SiteOrigin::Dom));
        assert_eq!(result.sites[0].name, "Loop C 9");
        assert_eq!(result.sites[0].price.as_deref(), Some("$60"));
    }
}
