//! Site records from JSON responses the page fetched on its own.

use campwatch_browser::ObservedResponse;
use campwatch_core::{SiteOrigin, SiteRecord};
use serde_json::Value;
use url::Url;

use super::{Evidence, EvidenceSource, PageEvidence};

/// URL fragments that suggest an availability API.
const URL_HINTS: &[&str] = &["availability", "search", "sites", "campground"];

/// Keys whose array value is taken as a list of sites, in preference order.
const SITE_ARRAY_KEYS: &[&str] = &["sites", "results", "campsites", "availability"];

const NAME_KEYS: &[&str] = &["name", "siteName", "site_name", "title", "siteNumber", "site_number", "displayName"];
const PRICE_KEYS: &[&str] = &["price", "rate", "nightlyRate", "nightly_rate", "totalPrice", "total_price", "amount"];
const DETAIL_KEYS: &[&str] = &["description", "details", "type", "siteType", "site_type", "category"];
const AVAILABILITY_KEYS: &[&str] = &["availability", "status", "available", "isAvailable", "is_available"];

const MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiPayload {
    pub url: String,
    pub body: Value,
}

/// Same-origin JSON response whose URL looks like an availability endpoint.
pub fn is_candidate_response(response: &ObservedResponse, target: &Url) -> bool {
    if !(200..300).contains(&response.status) || !response.mime_type.to_lowercase().contains("json") {
        return false;
    }
    let Ok(url) = Url::parse(&response.url) else {
        return false;
    };
    if url.origin() != target.origin() {
        return false;
    }
    let path_and_query = format!("{}?{}", url.path(), url.query().unwrap_or("")).to_lowercase();
    URL_HINTS.iter().any(|hint| path_and_query.contains(hint))
}

/// Locate a recognizable site array anywhere near the top of `body` and turn
/// its objects into records. Objects without a usable name are skipped.
pub fn parse_site_payload(body: &Value) -> Vec<SiteRecord> {
    find_site_array(body, 0)
        .map(|items| items.iter().filter_map(record_from_value).collect())
        .unwrap_or_default()
}

fn find_site_array(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    if depth > MAX_DEPTH {
        return None;
    }
    let obj = value.as_object()?;
    for key in SITE_ARRAY_KEYS {
        if let Some(Value::Array(items)) = obj.get(*key) {
            if items.iter().any(Value::is_object) {
                return Some(items);
            }
        }
    }
    obj.values().find_map(|v| find_site_array(v, depth + 1))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("available".to_string()),
        Value::Bool(false) => Some("unavailable".to_string()),
        _ => None,
    }
}

fn field(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_text))
}

fn record_from_value(value: &Value) -> Option<SiteRecord> {
    let obj = value.as_object()?;
    let name = field(obj, NAME_KEYS)?;
    Some(SiteRecord {
        name,
        price: field(obj, PRICE_KEYS),
        details: field(obj, DETAIL_KEYS),
        availability: field(obj, AVAILABILITY_KEYS),
    })
}

pub struct ApiResponses;

impl EvidenceSource for ApiResponses {
    fn name(&self) -> &'static str {
        "api-responses"
    }

    fn collect(&self, page: &PageEvidence) -> Vec<Evidence> {
        page.api_payloads
            .iter()
            .map(|payload| parse_site_payload(&payload.body))
            .filter(|records| !records.is_empty())
            .map(|records| Evidence::Sites {
                origin: SiteOrigin::Api,
                records,
            })
            .collect()
    }
}
