use once_cell::sync::Lazy;
use regex::Regex;

use super::{Evidence, EvidenceSource, PageEvidence};

static SITE_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,5})\s+(?:camp)?sites?\s+available\b").expect("valid regex"));

static NO_SITES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bno\s+(?:camp)?sites?\s+(?:are\s+)?(?:currently\s+)?available\b").expect("valid regex")
});

/// Number in the first text node reading "<n> site(s) available".
pub fn find_site_count<S: AsRef<str>>(text_nodes: &[S]) -> Option<u32> {
    text_nodes.iter().find_map(|node| {
        SITE_COUNT_RE
            .captures(node.as_ref())
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

pub fn has_no_sites_notice(body_text: &str) -> bool {
    NO_SITES_RE.is_match(body_text)
}

/// The authoritative count signal.
pub struct SiteCountText;

impl EvidenceSource for SiteCountText {
    fn name(&self) -> &'static str {
        "site-count-text"
    }

    fn collect(&self, page: &PageEvidence) -> Vec<Evidence> {
        find_site_count(&page.text_nodes)
            .map(Evidence::SiteCount)
            .into_iter()
            .collect()
    }
}

pub struct NoSitesNotice;

impl EvidenceSource for NoSitesNotice {
    fn name(&self) -> &'static str {
        "no-sites-notice"
    }

    fn collect(&self, page: &PageEvidence) -> Vec<Evidence> {
        if has_no_sites_notice(&page.body_text) {
            vec![Evidence::NoSitesNotice]
        } else {
            Vec::new()
        }
    }
}
