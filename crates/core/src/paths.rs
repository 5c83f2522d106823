use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".campwatch"))
            .unwrap_or_else(|| PathBuf::from(".campwatch"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Shared temp directory; screenshots land here unless configured otherwise.
    pub fn default_screenshot_dir() -> PathBuf {
        std::env::temp_dir()
    }

    /// Throwaway Chrome profile for a single probe.
    pub fn browser_profile_dir(id: &str) -> PathBuf {
        std::env::temp_dir().join(format!("campwatch-profile-{}", id))
    }

    pub fn screenshot_file(dir: &Path, at: DateTime<Local>) -> PathBuf {
        dir.join(format!("campwatch-{}.png", at.format("%Y%m%d-%H%M%S")))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
