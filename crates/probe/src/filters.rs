//! Search filters applied by poking at the rendered form.
//!
//! Nothing here is fatal: a filter that cannot be found is logged and skipped.

use campwatch_browser::{InputHint, PageDriver};
use campwatch_core::{Result, SearchCriteria};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Elements that may carry a "Way to Stay" choice.
pub const RV_TYPE_SELECTOR: &str = r#"button, [role="button"], option, li, label"#;

pub const LENGTH_INPUT_SELECTOR: &str = r#"input[type="number"], input[name*="length" i], input[id*="length" i], input[placeholder*="length" i], input[aria-label*="length" i]"#;

pub const ACTION_SELECTOR: &str = r#"button, [role="button"], input[type="submit"], input[type="button"], a"#;

/// Labels of controls that re-run the search.
pub const ACTION_LABELS: &[&str] = &["search", "update", "apply", "find sites", "check availability"];

/// Longer texts belong to containers, not buttons.
const MAX_ACTION_TEXT: usize = 40;

/// Pause after a click so the widget can react.
const CLICK_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedFilters {
    pub rv_type: bool,
    pub rv_length: bool,
    pub submitted: bool,
}

impl AppliedFilters {
    pub fn any(&self) -> bool {
        self.rv_type || self.rv_length
    }
}

/// Index of the element to click for `wanted`. An exact (case-insensitive)
/// text match wins over a partial one; otherwise the first element whose
/// text contains `wanted`.
pub fn pick_rv_type_candidate(texts: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let normalized: Vec<String> = texts.iter().map(|t| t.trim().to_lowercase()).collect();
    normalized
        .iter()
        .position(|t| *t == wanted)
        .or_else(|| normalized.iter().position(|t| t.contains(&wanted)))
}

fn mentions_length(s: &str) -> bool {
    s.to_lowercase().contains("length")
}

/// Input to receive the RV length. An input's own name, id, placeholder,
/// aria-label or `<label>` wins; surrounding text is only consulted when no
/// input describes itself.
pub fn pick_length_input(hints: &[InputHint]) -> Option<usize> {
    hints
        .iter()
        .position(|h| {
            [&h.name, &h.id, &h.placeholder, &h.aria_label, &h.label]
                .iter()
                .any(|s| mentions_length(s))
        })
        .or_else(|| hints.iter().position(|h| mentions_length(&h.context)))
}

/// First short control labelled like a search/apply action.
pub fn pick_action_control(texts: &[String]) -> Option<usize> {
    texts.iter().position(|t| {
        let t = t.trim().to_lowercase();
        !t.is_empty()
            && t.chars().count() <= MAX_ACTION_TEXT
            && ACTION_LABELS.iter().any(|label| t == *label || t.contains(label))
    })
}

/// Apply whatever filters `criteria` asks for, then hit the search button
/// if anything changed. Errors only on driver failures.
pub async fn apply_filters(
    page: &mut dyn PageDriver,
    criteria: &SearchCriteria,
) -> Result<AppliedFilters> {
    let mut applied = AppliedFilters::default();

    if let Some(rv_type) = criteria.rv_type.as_deref() {
        let texts = page.element_texts(RV_TYPE_SELECTOR).await?;
        match pick_rv_type_candidate(&texts, rv_type) {
            Some(idx) => {
                info!(rv_type = %rv_type, matched = %texts[idx], "Selecting RV type");
                page.click_element(RV_TYPE_SELECTOR, idx).await?;
                tokio::time::sleep(CLICK_PAUSE).await;
                applied.rv_type = true;
            }
            None => {
                warn!(rv_type = %rv_type, candidates = texts.len(), "RV type option not found, continuing without it");
            }
        }
    }

    if let Some(length) = criteria.rv_length {
        let hints = page.input_hints(LENGTH_INPUT_SELECTOR).await?;
        match pick_length_input(&hints) {
            Some(idx) => {
                info!(rv_length = length, input = %hints[idx].name, "Setting RV length");
                page.set_input_value(LENGTH_INPUT_SELECTOR, idx, &length.to_string())
                    .await?;
                applied.rv_length = true;
            }
            None => {
                warn!(rv_length = length, "RV length input not found, continuing without it");
            }
        }
    }

    if applied.any() {
        let texts = page.element_texts(ACTION_SELECTOR).await?;
        if let Some(idx) = pick_action_control(&texts) {
            debug!(control = %texts[idx], "Submitting search");
            page.click_element(ACTION_SELECTOR, idx).await?;
            applied.submitted = true;
        } else {
            debug!("No search/apply control found");
        }
    }

    Ok(applied)
}
