pub mod watch;

pub use watch::{report_line, CycleOutcome, Watcher};
