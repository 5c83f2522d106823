//! Site cards scraped from captured HTML.
//!
//! The provider's markup is not ours and changes without notice, so every
//! selector here is a guess. Card selectors are tried in order and the first
//! one that yields named cards wins.

use campwatch_core::{SiteOrigin, SiteRecord};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::{Evidence, EvidenceSource, PageEvidence};

const CARD_SELECTORS: &[&str] = &[
    r#"[data-testid*="site-card" i]"#,
    r#"[class*="site-card" i]"#,
    r#"[class*="sitecard" i]"#,
    r#"[class*="campsite" i]"#,
    r#"[class*="unit-card" i]"#,
    r#"[class*="result-card" i]"#,
    r#"[class*="search-result" i]"#,
    r#"[data-site-id]"#,
];

const NAME_SELECTORS: &[&str] = &[
    r#"[class*="name" i]"#,
    r#"[class*="title" i]"#,
    "h2",
    "h3",
    "h4",
];

const PRICE_SELECTORS: &[&str] = &[r#"[class*="price" i]"#, r#"[class*="rate" i]"#];

const DETAIL_SELECTORS: &[&str] = &[
    r#"[class*="detail" i]"#,
    r#"[class*="description" i]"#,
    r#"[class*="amenit" i]"#,
];

const AVAILABILITY_SELECTORS: &[&str] = &[r#"[class*="avail" i]"#, r#"[class*="status" i]"#];

fn compile(list: &[&str]) -> Vec<Selector> {
    // Unparsable selectors are skipped rather than failing the probe.
    list.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

static CARDS: Lazy<Vec<Selector>> = Lazy::new(|| compile(CARD_SELECTORS));
static NAMES: Lazy<Vec<Selector>> = Lazy::new(|| compile(NAME_SELECTORS));
static PRICES: Lazy<Vec<Selector>> = Lazy::new(|| compile(PRICE_SELECTORS));
static DETAILS: Lazy<Vec<Selector>> = Lazy::new(|| compile(DETAIL_SELECTORS));
static AVAILABILITY: Lazy<Vec<Selector>> = Lazy::new(|| compile(AVAILABILITY_SELECTORS));

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(card: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        card.select(sel)
            .map(element_text)
            .find(|t| !t.is_empty())
    })
}

fn parse_card(card: ElementRef<'_>) -> Option<SiteRecord> {
    let name = first_text(card, &NAMES)?;
    Some(SiteRecord {
        name,
        price: first_text(card, &PRICES),
        details: first_text(card, &DETAILS),
        availability: first_text(card, &AVAILABILITY),
    })
}

pub fn scrape_site_cards(html: &str) -> Vec<SiteRecord> {
    if html.is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_document(html);
    for selector in CARDS.iter() {
        let mut records: Vec<SiteRecord> = Vec::new();
        for card in doc.select(selector) {
            if let Some(record) = parse_card(card) {
                if !records.contains(&record) {
                    records.push(record);
                }
            }
        }
        if !records.is_empty() {
            return records;
        }
    }
    Vec::new()
}

pub struct SiteCards;

impl EvidenceSource for SiteCards {
    fn name(&self) -> &'static str {
        "site-cards"
    }

    fn collect(&self, page: &PageEvidence) -> Vec<Evidence> {
        let records = scrape_site_cards(&page.html);
        if records.is_empty() {
            Vec::new()
        } else {
            vec![Evidence::Sites {
                origin: SiteOrigin::Dom,
                records,
            }]
        }
    }
}
