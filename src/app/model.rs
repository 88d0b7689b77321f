use serde::{Deserialize, Serialize};

use crate::catalog::{Card, CategoryOption, DetailView};
use crate::formats::{Chapter, ReviewRecord};
use crate::reviews::ReviewSummary;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorksQuery {
    pub q: Option<String>,
    pub year: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksResponse {
    /// Canonical query string for the applied filters; empty when unfiltered.
    pub query: String,
    pub works: Vec<Card>,
    pub years: Vec<String>,
    pub categories: Vec<CategoryOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkResponse {
    pub detail: DetailView,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewsResponse {
    pub summary: ReviewSummary,
    /// Newest first.
    pub reviews: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
