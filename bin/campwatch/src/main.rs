mod commands;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LONG_ABOUT: &str = "\
Watches a campground booking page for open sites.

Each check launches a fresh browser, loads the booking page with the stay
dates in the query string, applies the RV filters by matching visible control
text, waits for results, then reads the \"N sites available\" line.

The query parameter names (checkin, checkout, adults) and the filter matching
depend on the booking provider's current markup. When the provider changes
its page, checks report zero until those conventions are updated.";

#[derive(Parser)]
#[command(name = "campwatch")]
#[command(about = "Campsite availability monitor", long_about = LONG_ABOUT)]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    watch: WatchArgs,

    /// Config file (default: ~/.campwatch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run environment diagnostics
    Doctor,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Arrival date (YYYY-MM-DD)
    #[arg(long, required = true)]
    pub check_in: Option<NaiveDate>,

    /// Departure date (YYYY-MM-DD)
    #[arg(long, required = true)]
    pub check_out: Option<NaiveDate>,

    /// "Way to Stay" option to select, e.g. "Travel Trailer"
    #[arg(long)]
    pub rv_type: Option<String>,

    /// RV length in feet
    #[arg(long)]
    pub rv_length: Option<u32>,

    /// Number of guests
    #[arg(long, default_value_t = 2)]
    pub guests: u32,

    /// Keep checking until interrupted
    #[arg(long = "loop")]
    pub watch_loop: bool,

    /// Minutes between checks (overrides config watch.intervalMinutes)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Desktop notification and bell when sites are found
    #[arg(long)]
    pub notify: bool,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Booking page URL (overrides config probe.bookingUrl)
    #[arg(long)]
    pub url: Option<String>,

    /// Also scrape site cards and availability API responses
    #[arg(long)]
    pub deep: bool,

    /// Seconds to wait for results after filtering
    #[arg(long)]
    pub results_wait: Option<u64>,
}

/// `RUST_LOG` wins when set; otherwise `-v` selects debug.
fn log_directive(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log.filter(|s| !s.trim().is_empty()) {
        Some(directive) => directive,
        None if verbose => "debug".to_string(),
        None => "info".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = log_directive(cli.verbose, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Doctor) => {
            commands::doctor::run(cli.config.as_deref()).await?;
        }
        None => {
            commands::watch::run(cli.watch, cli.config.as_deref()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_flags() {
        let cli = Cli::try_parse_from([
            "campwatch",
            "--check-in",
            "2026-03-13",
            "--check-out",
            "2026-03-14",
            "--rv-type",
            "Travel Trailer",
            "--rv-length",
            "25",
            "--loop",
            "--interval",
            "10",
            "--notify",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        let w = cli.watch;
        assert_eq!(w.check_in, NaiveDate::from_ymd_opt(2026, 3, 13));
        assert_eq!(w.rv_type.as_deref(), Some("Travel Trailer"));
        assert_eq!(w.rv_length, Some(25));
        assert_eq!(w.guests, 2);
        assert!(w.watch_loop && w.notify && !w.headless);
        assert_eq!(w.interval, Some(10));
    }

    #[test]
    fn test_dates_required_without_subcommand() {
        assert!(Cli::try_parse_from(["campwatch", "--check-in", "2026-03-13"]).is_err());
        assert!(Cli::try_parse_from(["campwatch", "--check-in", "13/03/2026", "--check-out", "2026-03-14"]).is_err());
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(log_directive(false, None), "info");
        assert_eq!(log_directive(true, None), "debug");
        assert_eq!(log_directive(true, Some("campwatch_probe=trace".into())), "campwatch_probe=trace");
        assert_eq!(log_directive(false, Some("  ".into())), "info");
    }

    #[test]
    fn test_doctor_needs_no_dates() {
        let cli = Cli::try_parse_from(["campwatch", "doctor"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Doctor)));
    }
}
