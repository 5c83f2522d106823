use campwatch_core::{ProbeResult, SearchCriteria};
use campwatch_notifier::{availability_message, Notifier};
use campwatch_probe::AvailabilityProbe;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    pub count: u32,
    pub notified: bool,
}

/// One console line per cycle.
pub fn report_line(at: DateTime<Local>, result: &ProbeResult, criteria: &SearchCriteria) -> String {
    let stamp = at.format("%Y-%m-%d %H:%M:%S");
    if result.is_available() {
        let mut line = format!("[{}] ✅ {}", stamp, availability_message(result, criteria));
        for site in &result.sites {
            line.push_str(&format!("\n    - {}", site.name));
            if let Some(price) = &site.price {
                line.push_str(&format!(" ({})", price));
            }
        }
        line
    } else {
        format!(
            "[{}] ❌ No sites available for {} → {}",
            stamp, criteria.check_in, criteria.check_out
        )
    }
}

/// Probe, report, notify; optionally forever with a fixed gap between cycles.
pub struct Watcher {
    probe: Arc<dyn AvailabilityProbe>,
    notifier: Option<Arc<dyn Notifier>>,
    criteria: SearchCriteria,
    interval: Duration,
}

impl Watcher {
    pub fn new(probe: Arc<dyn AvailabilityProbe>, criteria: SearchCriteria) -> Self {
        Self {
            probe,
            notifier: None,
            criteria,
            interval: Duration::from_secs(5 * 60),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_once(&self) -> CycleOutcome {
        let result = self.probe.probe(&self.criteria).await;
        println!("{}", report_line(result.checked_at, &result, &self.criteria));
        if let Some(path) = &result.screenshot {
            debug!(path = %path.display(), "Screenshot for this cycle");
        }

        let mut notified = false;
        if result.is_available() {
            if let Some(notifier) = &self.notifier {
                notifier
                    .notify(&availability_message(&result, &self.criteria))
                    .await;
                notified = true;
            }
        }
        CycleOutcome {
            count: result.count,
            notified,
        }
    }

    /// Cycle until `shutdown` fires. The sleep starts after a cycle finishes,
    /// so cycles never overlap.
    pub async fn run_loop(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "Watch loop started");
        loop {
            tokio::select! {
                _ = async {
                    self.run_once().await;
                    info!(minutes = self.interval.as_secs() / 60, "Next check scheduled");
                    tokio::time::sleep(self.interval).await;
                } => {}
                _ = shutdown.recv() => {
                    info!("Watch loop shutting down");
                    break;
                }
            }
        }
    }
}
