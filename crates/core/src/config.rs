use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

pub const DEFAULT_BOOKING_URL: &str = "https://reservations.example.com/book";

/// One week.
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Base booking page. Dates are appended as query parameters.
    #[serde(default = "default_booking_url")]
    pub booking_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Hard limit on navigation plus network quiescence.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    /// Quiet window that counts as "network idle".
    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,
    /// Extra sleep after network idle; the widget renders late.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    /// Fixed wait for results after filters are applied.
    #[serde(default = "default_results_wait_secs")]
    pub results_wait_secs: u64,
    /// Defaults to the OS temp directory.
    #[serde(default)]
    pub screenshot_dir: Option<String>,
    /// Also scrape site cards and watch JSON responses.
    #[serde(default)]
    pub deep_inspection: bool,
}

fn default_booking_url() -> String {
    DEFAULT_BOOKING_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_network_idle_ms() -> u64 {
    500
}

fn default_settle_delay_secs() -> u64 {
    3
}

fn default_results_wait_secs() -> u64 {
    30
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            booking_url: default_booking_url(),
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            network_idle_ms: default_network_idle_ms(),
            settle_delay_secs: default_settle_delay_secs(),
            results_wait_secs: default_results_wait_secs(),
            screenshot_dir: None,
            deep_inspection: false,
        }
    }
}

impl ProbeConfig {
    pub fn screenshot_dir(&self) -> PathBuf {
        match self.screenshot_dir.as_deref() {
            Some(dir) if !dir.is_empty() => expand_home(dir),
            _ => Paths::default_screenshot_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Chrome/Chromium binary. Auto-detected when unset.
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_window_width() -> u32 {
    1366
}

fn default_window_height() -> u32 {
    900
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_interval_minutes() -> u64 {
    5
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_notify_title")]
    pub title: String,
    /// macOS sound name.
    #[serde(default = "default_notify_sound")]
    pub sound: String,
}

fn default_notify_title() -> String {
    "Campsite available".to_string()
}

fn default_notify_sound() -> String {
    "Glass".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            title: default_notify_title(),
            sound: default_notify_sound(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch.interval_minutes == 0 {
            return Err(Error::Config("watch.intervalMinutes must be at least 1".into()));
        }
        if self.watch.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(Error::Config(format!(
                "watch.intervalMinutes must be at most {}",
                MAX_INTERVAL_MINUTES
            )));
        }
        if self.probe.navigation_timeout_secs == 0 {
            return Err(Error::Config("probe.navigationTimeoutSecs must be at least 1".into()));
        }
        let url = url::Url::parse(&self.probe.booking_url)
            .map_err(|e| Error::Config(format!("probe.bookingUrl is not a valid URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "probe.bookingUrl must be http(s), got '{}'",
                url.scheme()
            )));
        }
        Ok(())
    }
}

fn expand_home(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(p)
}
