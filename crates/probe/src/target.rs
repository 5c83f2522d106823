//! Navigation target for the booking page.
//!
//! The provider reads the stay from query parameters. The names are not
//! documented by the provider and will break if it changes them.

use campwatch_core::{Error, Result, SearchCriteria};
use url::Url;

pub const CHECK_IN_PARAM: &str = "checkin";
pub const CHECK_OUT_PARAM: &str = "checkout";
pub const GUESTS_PARAM: &str = "adults";

/// Append the stay dates and guest count to `base`, replacing any previous
/// values for the same parameters and keeping everything else.
pub fn build_target_url(base: &str, criteria: &SearchCriteria) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| Error::Config(format!("invalid booking URL '{}': {}", base, e)))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !matches!(k.as_ref(), CHECK_IN_PARAM | CHECK_OUT_PARAM | GUESTS_PARAM))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair(CHECK_IN_PARAM, &criteria.check_in.format("%Y-%m-%d").to_string());
        pairs.append_pair(CHECK_OUT_PARAM, &criteria.check_out.format("%Y-%m-%d").to_string());
        pairs.append_pair(GUESTS_PARAM, &criteria.guests.to_string());
    }
    Ok(url)
}
