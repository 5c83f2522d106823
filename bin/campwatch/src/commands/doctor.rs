use campwatch_browser::find_browser_binary;
use campwatch_core::{Config, Paths};
use campwatch_notifier::{notification_available, Platform};
use std::path::Path;

use super::watch::load_config;

/// Check the environment a probe depends on.
pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file());

    println!();
    println!("🩺 campwatch doctor — Environment Diagnostics");
    println!("================================");
    println!();

    let mut ok_count = 0u32;
    let mut warn_count = 0u32;
    let mut err_count = 0u32;

    // --- 1. Config ---
    println!("📋 Configuration");
    if config_file.exists() {
        print_ok("Config file exists", &config_file.display().to_string());
        ok_count += 1;
    } else {
        print_warn("No config file", "Built-in defaults will be used");
        warn_count += 1;
    }

    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            print_err("Config file unreadable", &format!("{:#}", e));
            err_count += 1;
            Config::default()
        }
    };
    match config.validate() {
        Ok(()) => {
            print_ok("Config valid", "");
            ok_count += 1;
        }
        Err(e) => {
            print_err("Config invalid", &e.to_string());
            err_count += 1;
        }
    }
    println!("  Booking URL: {}", config.probe.booking_url);
    println!("  Interval: {} min", config.watch.interval_minutes);
    println!();

    // --- 2. Browser ---
    println!("🌐 Browser");
    let browser = config
        .browser
        .executable
        .clone()
        .filter(|p| Path::new(p).exists())
        .or_else(find_browser_binary);
    match browser {
        Some(bin) => {
            print_ok("Chrome/Chromium found", &bin);
            ok_count += 1;
        }
        None => {
            print_err(
                "Chrome/Chromium not found",
                "Install Chrome or set browser.executable in config.json",
            );
            err_count += 1;
        }
    }
    println!();

    // --- 3. Notifications ---
    println!("🔔 Notifications");
    let platform = Platform::current();
    match platform.notification_program() {
        Some(program) if notification_available(platform) => {
            print_ok("Notification command available", program);
            ok_count += 1;
        }
        Some(program) => {
            print_warn(
                &format!("{} not found", program),
                "--notify will only ring the terminal bell",
            );
            warn_count += 1;
        }
        None => {
            print_warn("No notification command for this platform", "");
            warn_count += 1;
        }
    }
    println!();

    // --- 4. Screenshots ---
    println!("📸 Screenshots");
    let dir = config.probe.screenshot_dir();
    match check_writable(&dir) {
        Ok(()) => {
            print_ok("Screenshot directory writable", &dir.display().to_string());
            ok_count += 1;
        }
        Err(e) => {
            print_err("Screenshot directory not writable", &format!("{}: {}", dir.display(), e));
            err_count += 1;
        }
    }
    println!();

    // --- Summary ---
    println!("================================");
    println!(
        "Summary: {} ok, {} warnings, {} errors",
        ok_count, warn_count, err_count
    );
    println!();

    Ok(())
}

fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".campwatch_doctor_test");
    std::fs::write(&probe, "test")?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ⚠️  {}", label);
    } else {
        println!("  ⚠️  {} — {}", label, hint);
    }
}

fn print_err(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ❌ {}", label);
    } else {
        println!("  ❌ {} — {}", label, hint);
    }
}
