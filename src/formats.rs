use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog entry after normalization. Every field carries a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub slug: String,
    pub cover_image_url: String,
    pub synopsis: String,
    pub purchase_link: String,
    /// External reading link; empty when the work is read through the built-in reader.
    pub read_link: String,
    pub release_date: Option<String>,
    pub year: String,
    pub category: String,
    pub visible: bool,
    pub free_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    pub name: String,
    pub content: String,
    pub available: bool,
}

/// A single work as opened by the reader, chapters included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDetail {
    pub work: WorkRecord,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
