pub mod extract;
pub mod filters;
pub mod prober;
pub mod target;

#[cfg(test)]
mod testing;

pub use extract::{merge, Evidence, EvidenceSource, Extractor, PageEvidence};
pub use filters::{apply_filters, AppliedFilters};
pub use prober::{AvailabilityProbe, ProbeFailure, ProbeSettings, Prober};
pub use target::build_target_url;
