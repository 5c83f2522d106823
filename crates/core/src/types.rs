use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// What to look for. Built once at startup and reused for every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// "Way to Stay" label, e.g. "Travel Trailer".
    pub rv_type: Option<String>,
    /// Feet.
    pub rv_length: Option<u32>,
    pub guests: u32,
}

impl SearchCriteria {
    pub fn new(
        check_in: NaiveDate,
        check_out: NaiveDate,
        rv_type: Option<String>,
        rv_length: Option<u32>,
        guests: u32,
    ) -> Result<Self> {
        if check_out <= check_in {
            return Err(Error::Validation(format!(
                "check-out ({}) must be after check-in ({})",
                check_out, check_in
            )));
        }
        if rv_length == Some(0) {
            return Err(Error::Validation("RV length must be greater than 0".into()));
        }
        if guests == 0 {
            return Err(Error::Validation("guest count must be at least 1".into()));
        }
        let rv_type = rv_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(Self {
            check_in,
            check_out,
            rv_type,
            rv_length,
            guests,
        })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn has_filters(&self) -> bool {
        self.rv_type.is_some() || self.rv_length.is_some()
    }
}

/// Where a site list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteOrigin {
    /// JSON payload observed on the wire.
    Api,
    /// Card-like elements scraped from the rendered page.
    Dom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// Outcome of one probe. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub count: u32,
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub site_origin: Option<SiteOrigin>,
    /// A "no sites available" phrase was present on the page.
    #[serde(default)]
    pub no_sites_notice: bool,
    pub checked_at: DateTime<Local>,
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
}

impl ProbeResult {
    /// Zero result. Also what a failed probe reports.
    pub fn not_found() -> Self {
        Self {
            count: 0,
            sites: Vec::new(),
            site_origin: None,
            no_sites_notice: false,
            checked_at: Local::now(),
            screenshot: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_criteria_valid() {
        let c = SearchCriteria::new(
            date("2026-03-13"),
            date("2026-03-14"),
            Some("  Travel Trailer ".into()),
            Some(30),
            2,
        )
        .unwrap();
        assert_eq!(c.rv_type.as_deref(), Some("Travel Trailer"));
        assert_eq!(c.nights(), 1);
        assert!(c.has_filters());
    }

    #[test]
    fn test_criteria_rejects_reversed_dates() {
        let err = SearchCriteria::new(date("2026-03-14"), date("2026-03-13"), None, None, 2);
        assert!(matches!(err, Err(Error::Validation(_))));
        let same = SearchCriteria::new(date("2026-03-14"), date("2026-03-14"), None, None, 2);
        assert!(same.is_err());
    }

    #[test]
    fn test_criteria_rejects_zero_length_and_guests() {
        assert!(SearchCriteria::new(date("2026-03-13"), date("2026-03-14"), None, Some(0), 2).is_err());
        assert!(SearchCriteria::new(date("2026-03-13"), date("2026-03-14"), None, None, 0).is_err());
    }

    #[test]
    fn test_blank_rv_type_is_no_filter() {
        let c = SearchCriteria::new(date("2026-03-13"), date("2026-03-15"), Some("   ".into()), None, 1)
            .unwrap();
        assert!(c.rv_type.is_none());
        assert!(!c.has_filters());
    }

    #[test]
    fn test_not_found_is_zero() {
        let r = ProbeResult::not_found();
        assert_eq!(r.count, 0);
        assert!(!r.is_available());
        assert!(r.sites.is_empty());
    }
}
