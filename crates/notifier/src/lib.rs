//! Desktop notification and terminal bell for positive probe results.

use async_trait::async_trait;
use campwatch_core::{Error, ProbeResult, Result, SearchCriteria};
use std::io::Write;
use tracing::{debug, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort delivery. Never fails the caller.
    async fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// Program used to show notifications on this platform.
    pub fn notification_program(&self) -> Option<&'static str> {
        match self {
            Platform::MacOs => Some("osascript"),
            Platform::Linux => Some("notify-send"),
            Platform::Windows => Some("powershell"),
            Platform::Other => None,
        }
    }
}

/// "3 sites available for 2026-03-13 → 2026-03-14"
pub fn availability_message(result: &ProbeResult, criteria: &SearchCriteria) -> String {
    let noun = if result.count == 1 { "site" } else { "sites" };
    let mut msg = format!(
        "{} {} available for {} → {}",
        result.count, noun, criteria.check_in, criteria.check_out
    );
    if let Some(rv_type) = &criteria.rv_type {
        msg.push_str(&format!(" ({})", rv_type));
    }
    msg
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_powershell(s: &str) -> String {
    s.replace('\'', "''")
}

/// Program and arguments that raise a desktop notification.
pub fn notification_command(
    platform: Platform,
    title: &str,
    message: &str,
    sound: &str,
) -> Option<(String, Vec<String>)> {
    let program = platform.notification_program()?.to_string();
    let args = match platform {
        Platform::MacOs => {
            let script = format!(
                r#"display notification "{}" with title "{}" sound name "{}""#,
                escape_applescript(message),
                escape_applescript(title),
                escape_applescript(sound)
            );
            vec!["-e".to_string(), script]
        }
        Platform::Linux => vec![
            "-u".to_string(),
            "critical".to_string(),
            "-a".to_string(),
            "campwatch".to_string(),
            title.to_string(),
            message.to_string(),
        ],
        Platform::Windows => {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Visible = $true; \
                 $n.ShowBalloonTip(10000, '{}', '{}', [System.Windows.Forms.ToolTipIcon]::Info); \
                 Start-Sleep -Seconds 10; $n.Dispose()",
                escape_powershell(title),
                escape_powershell(message)
            );
            vec!["-NoProfile".to_string(), "-Command".to_string(), script]
        }
        Platform::Other => return None,
    };
    Some((program, args))
}

/// Whether the notification program for `platform` is on PATH.
pub fn notification_available(platform: Platform) -> bool {
    platform
        .notification_program()
        .map(|p| which::which(p).is_ok())
        .unwrap_or(false)
}

pub struct DesktopNotifier {
    title: String,
    sound: String,
    platform: Platform,
    bell: bool,
}

impl DesktopNotifier {
    pub fn new(title: impl Into<String>, sound: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sound: sound.into(),
            platform: Platform::current(),
            bell: true,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    async fn send_desktop(&self, message: &str) -> Result<()> {
        let (program, args) = notification_command(self.platform, &self.title, message, &self.sound)
            .ok_or_else(|| Error::Notification("no notification command for this platform".into()))?;

        let output = tokio::process::Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Notification(format!("{} failed to start: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Notification(format!("{} error: {}", program, stderr.trim())));
        }
        Ok(())
    }

    fn ring_bell(&self) {
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, message: &str) {
        match self.send_desktop(message).await {
            Ok(()) => info!(title = %self.title, "Desktop notification sent"),
            Err(e) => debug!(error = %e, "Desktop notification not delivered"),
        }
        if self.bell {
            self.ring_bell();
        }
    }
}
