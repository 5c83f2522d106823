//! Availability extraction.
//!
//! Every selector and text pattern lives behind [`EvidenceSource`]. A source
//! looks at a [`PageEvidence`] capture and reports what it found; [`merge`]
//! turns the combined evidence into a [`ProbeResult`] with one precedence rule:
//! the count comes from the site-count text, and API records beat DOM cards
//! for the site list. Without count text or a "no sites" notice, the number
//! of API records stands in for the count.

mod api;
mod cards;
mod text;

pub use api::{is_candidate_response, parse_site_payload, ApiPayload, ApiResponses};
pub use cards::SiteCards;
pub use text::{find_site_count, has_no_sites_notice, NoSitesNotice, SiteCountText};

use campwatch_core::{ProbeResult, SiteOrigin, SiteRecord};

/// Raw material captured from a rendered page.
#[derive(Debug, Clone, Default)]
pub struct PageEvidence {
    pub text_nodes: Vec<String>,
    pub body_text: String,
    pub html: String,
    pub api_payloads: Vec<ApiPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    SiteCount(u32),
    Sites {
        origin: SiteOrigin,
        records: Vec<SiteRecord>,
    },
    NoSitesNotice,
}

pub trait EvidenceSource: Send + Sync {
    fn name(&self) -> &'static str;
    fn collect(&self, page: &PageEvidence) -> Vec<Evidence>;
}

/// Ranked list of evidence sources.
pub struct Extractor {
    sources: Vec<Box<dyn EvidenceSource>>,
}

impl Extractor {
    /// Count text only.
    pub fn basic() -> Self {
        Self {
            sources: vec![Box::new(SiteCountText)],
        }
    }

    /// Network payloads, count text, DOM cards and the "no sites" notice.
    pub fn deep() -> Self {
        Self {
            sources: vec![
                Box::new(ApiResponses),
                Box::new(SiteCountText),
                Box::new(SiteCards),
                Box::new(NoSitesNotice),
            ],
        }
    }

    pub fn new(deep: bool) -> Self {
        if deep {
            Self::deep()
        } else {
            Self::basic()
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn collect(&self, page: &PageEvidence) -> Vec<Evidence> {
        self.sources
            .iter()
            .flat_map(|source| {
                let found = source.collect(page);
                tracing::debug!(source = source.name(), items = found.len(), "Evidence collected");
                found
            })
            .collect()
    }

    pub fn extract(&self, page: &PageEvidence) -> ProbeResult {
        merge(self.collect(page))
    }
}

/// Fold evidence into a result. Order within a kind follows source rank.
pub fn merge(evidence: Vec<Evidence>) -> ProbeResult {
    let mut result = ProbeResult::not_found();
    let mut count = None;
    let mut api_sites: Option<Vec<SiteRecord>> = None;
    let mut dom_sites: Option<Vec<SiteRecord>> = None;

    for item in evidence {
        match item {
            Evidence::SiteCount(n) => {
                count.get_or_insert(n);
            }
            Evidence::Sites { origin, records } if !records.is_empty() => {
                let slot = match origin {
                    SiteOrigin::Api => &mut api_sites,
                    SiteOrigin::Dom => &mut dom_sites,
                };
                slot.get_or_insert_with(Vec::new).extend(records);
            }
            Evidence::Sites { .. } => {}
            Evidence::NoSitesNotice => result.no_sites_notice = true,
        }
    }

    result.count = match (count, &api_sites) {
        (Some(n), _) => n,
        (None, Some(sites)) if !result.no_sites_notice => {
            u32::try_from(sites.len()).unwrap_or(u32::MAX)
        }
        _ => 0,
    };
    if let Some(sites) = api_sites {
        result.sites = sites;
        result.site_origin = Some(SiteOrigin::Api);
    } else if let Some(sites) = dom_sites {
        result.sites = sites;
        result.site_origin = Some(SiteOrigin::Dom);
    }
    result
}
