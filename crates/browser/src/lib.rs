//! CDP-based browser automation for availability probes.
//!
//! - `cdp`: WebSocket client for the Chrome DevTools Protocol
//! - `session`: throwaway Chrome process per probe, network bookkeeping
//! - `page`: the `PageDriver` / `BrowserLauncher` seam the prober is written against

pub mod cdp;
pub mod page;
pub mod scripts;
pub mod session;

pub use page::{BrowserLauncher, InputHint, LaunchOptions, ObservedResponse, PageDriver};
pub use session::{find_browser_binary, BrowserSession, ChromeLauncher, NetworkLog};
