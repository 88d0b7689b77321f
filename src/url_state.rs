//! Deep-linking between [`FilterState`] and a page URL's query string.
//!
//! Parameters: `q` (search term), `year`, `category`. Only non-default values
//! are written, so an unfiltered catalog has no query string at all.

use url::Url;
use url::form_urlencoded;

use crate::filter::{ALL, FilterState};

pub const TERM_PARAM: &str = "q";
pub const YEAR_PARAM: &str = "year";
pub const CATEGORY_PARAM: &str = "category";

/// Reader page parameter carrying the work slug.
pub const WORK_PARAM: &str = "obra";

pub fn parse_query(query: &str) -> FilterState {
    let mut state = FilterState::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            TERM_PARAM => state.set_term(value.into_owned()),
            YEAR_PARAM => state.set_year(&value),
            CATEGORY_PARAM => state.set_category(&value),
            _ => {}
        }
    }
    state
}

pub fn from_url(url: &Url) -> FilterState {
    parse_query(url.query().unwrap_or_default())
}

pub fn to_query(state: &FilterState) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if !state.term().is_empty() {
        serializer.append_pair(TERM_PARAM, state.term());
    }
    if state.year() != ALL {
        serializer.append_pair(YEAR_PARAM, state.year());
    }
    if state.category() != ALL {
        serializer.append_pair(CATEGORY_PARAM, state.category());
    }
    serializer.finish()
}

/// Rewrites `url` in place (a history replace, not a push). Other query
/// parameters and the fragment are dropped.
pub fn replace_url(url: &mut Url, state: &FilterState) {
    let query = to_query(state);
    url.set_fragment(None);
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&query));
    }
}

/// Reads the reader page's work slug; blank counts as absent.
pub fn work_slug(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == WORK_PARAM)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|slug| !slug.is_empty())
}

/// `{route}?obra={slug}` with the slug percent-encoded.
pub fn reader_link(route: &str, slug: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(WORK_PARAM, slug)
        .finish();
    format!("{route}?{query}")
}
