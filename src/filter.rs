use serde::{Deserialize, Serialize};

use crate::formats::WorkRecord;

/// Sentinel for an unfiltered year or category.
pub const ALL: &str = "all";

/// The catalog filters. Year and category are kept in canonical form: blank
/// becomes `all` and the category is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    term: String,
    year: String,
    category: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            term: String::new(),
            year: ALL.to_owned(),
            category: ALL.to_owned(),
        }
    }
}

impl FilterState {
    pub fn new(term: impl Into<String>, year: &str, category: &str) -> Self {
        let mut state = Self::default();
        state.set_term(term);
        state.set_year(year);
        state.set_category(category);
        state
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn set_term(&mut self, term: impl Into<String>) {
        self.term = term.into();
    }

    pub fn set_year(&mut self, year: &str) {
        let year = year.trim();
        self.year = if year.is_empty() || year.eq_ignore_ascii_case(ALL) {
            ALL.to_owned()
        } else {
            year.to_owned()
        };
    }

    pub fn set_category(&mut self, category: &str) {
        let category = category.trim().to_lowercase();
        self.category = if category.is_empty() {
            ALL.to_owned()
        } else {
            category
        };
    }

    pub fn is_unfiltered(&self) -> bool {
        self.term.is_empty() && self.year == ALL && self.category == ALL
    }

    pub fn matches(&self, work: &WorkRecord) -> bool {
        self.matches_term(work) && self.matches_year(work) && self.matches_category(work)
    }

    fn matches_term(&self, work: &WorkRecord) -> bool {
        if self.term.is_empty() {
            return true;
        }
        let needle = self.term.to_lowercase();
        work.title.to_lowercase().contains(&needle)
            || work.synopsis.to_lowercase().contains(&needle)
    }

    fn matches_year(&self, work: &WorkRecord) -> bool {
        self.year == ALL || work.year == self.year
    }

    fn matches_category(&self, work: &WorkRecord) -> bool {
        self.category == ALL
            || work.category.is_empty()
            || work.category.to_lowercase() == self.category
    }
}

/// Stable filter: keeps the relative order of `works`.
pub fn filter_works<'a>(works: &'a [WorkRecord], state: &FilterState) -> Vec<&'a WorkRecord> {
    works.iter().filter(|work| state.matches(work)).collect()
}
