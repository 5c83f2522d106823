use anyhow::Context;
use campwatch_browser::ChromeLauncher;
use campwatch_core::{Config, Paths, SearchCriteria};
use campwatch_notifier::{DesktopNotifier, Notifier};
use campwatch_probe::{ProbeSettings, Prober};
use campwatch_scheduler::Watcher;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::WatchArgs;

/// Explicit `--config` must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Config::load(p).with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(Config::load_or_default(&Paths::new())?),
    }
}

/// Command-line flags win over the config file.
pub fn apply_overrides(config: &mut Config, args: &WatchArgs) {
    if let Some(url) = &args.url {
        config.probe.booking_url = url.clone();
    }
    if let Some(secs) = args.results_wait {
        config.probe.results_wait_secs = secs;
    }
    if args.deep {
        config.probe.deep_inspection = true;
    }
    if args.headless {
        config.browser.headless = true;
    }
    if let Some(minutes) = args.interval {
        config.watch.interval_minutes = minutes;
    }
    if args.notify {
        config.notify.enabled = true;
    }
}

pub fn criteria_from_args(args: &WatchArgs) -> anyhow::Result<SearchCriteria> {
    let check_in = args.check_in.context("--check-in is required")?;
    let check_out = args.check_out.context("--check-out is required")?;
    Ok(SearchCriteria::new(
        check_in,
        check_out,
        args.rv_type.clone(),
        args.rv_length,
        args.guests,
    )?)
}

pub async fn run(args: WatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    let criteria = criteria_from_args(&args)?;

    info!(
        check_in = %criteria.check_in,
        check_out = %criteria.check_out,
        rv_type = ?criteria.rv_type,
        rv_length = ?criteria.rv_length,
        guests = criteria.guests,
        "Watching for availability"
    );

    let prober = Prober::new(ChromeLauncher, ProbeSettings::from_config(&config));
    let mut watcher = Watcher::new(Arc::new(prober), criteria)
        .with_interval(config.watch.interval());
    if config.notify.enabled {
        let notifier: Arc<dyn Notifier> =
            Arc::new(DesktopNotifier::new(&config.notify.title, &config.notify.sound));
        watcher = watcher.with_notifier(notifier);
    }

    if !args.watch_loop {
        watcher.run_once().await;
        return Ok(());
    }

    watch_until(Arc::new(watcher), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Interrupted, stopping");
    })
    .await
}

/// Runs the watch loop in its own task until `stop` resolves, then waits for
/// the loop to exit.
pub async fn watch_until(watcher: Arc<Watcher>, stop: impl Future<Output = ()>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { watcher.run_loop(shutdown_rx).await });

    stop.await;
    let _ = shutdown_tx.send(());
    handle.await?;
    Ok(())
}
