use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::{ReviewsAddArgs, ReviewsCommand, ReviewsTarget};
use crate::config::Config;
use crate::formats::{ReviewRecord, WorkRecord};
use crate::kv_store::{KvStore, LocalFsKvStore};

/// Ratings at or above this count as approval.
pub const APPROVAL_THRESHOLD: u8 = 4;

pub fn review_key(subject: &str) -> String {
    format!("reviews:{subject}")
}

/// Reviews are filed under the slug, else the id, else `unknown`.
pub fn review_subject(work: &WorkRecord) -> &str {
    if !work.slug.is_empty() {
        return &work.slug;
    }
    work.id.as_deref().unwrap_or("unknown")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub percent: u32,
    pub average: f64,
    pub total: usize,
}

pub fn summarize(reviews: &[ReviewRecord]) -> ReviewSummary {
    if reviews.is_empty() {
        return ReviewSummary {
            percent: 0,
            average: 0.0,
            total: 0,
        };
    }

    let total = reviews.len();
    let approved = reviews
        .iter()
        .filter(|r| r.rating >= APPROVAL_THRESHOLD)
        .count();
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let average = f64::from(sum) / total as f64;

    ReviewSummary {
        percent: (approved as f64 / total as f64 * 100.0).round() as u32,
        average: (average * 10.0).round() / 10.0,
        total,
    }
}

pub fn newest_first(reviews: &[ReviewRecord]) -> Vec<&ReviewRecord> {
    reviews.iter().rev().collect()
}

/// Per-work review lists in a device-local store.
#[derive(Clone)]
pub struct Reviews {
    store: Arc<dyn KvStore>,
}

impl Reviews {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Oldest first. A corrupt entry reads as empty.
    pub async fn list(&self, subject: &str) -> anyhow::Result<Vec<ReviewRecord>> {
        let key = review_key(subject);
        let Some(raw) = self.store.get(&key).await.context("read reviews")? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(reviews) => Ok(reviews),
            Err(err) => {
                tracing::warn!(key = %key, %err, "corrupt review entry; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn add(
        &self,
        subject: &str,
        rating: u8,
        comment: &str,
    ) -> anyhow::Result<Vec<ReviewRecord>> {
        if !(1..=5).contains(&rating) {
            anyhow::bail!("rating must be between 1 and 5, got {rating}");
        }

        let mut reviews = self.list(subject).await?;
        reviews.push(ReviewRecord {
            rating,
            comment: comment.trim().to_owned(),
            created_at: chrono::Utc::now(),
        });

        let raw = serde_json::to_string(&reviews).context("serialize reviews")?;
        self.store
            .set(&review_key(subject), &raw)
            .await
            .context("write reviews")?;
        Ok(reviews)
    }

    pub async fn clear(&self, subject: &str) -> anyhow::Result<()> {
        self.store
            .remove(&review_key(subject))
            .await
            .context("clear reviews")
    }
}

pub async fn run(command: ReviewsCommand, config: &Config) -> anyhow::Result<()> {
    let reviews = Reviews::new(Arc::new(LocalFsKvStore::new(&config.reviews_dir)));

    match command {
        ReviewsCommand::Add(ReviewsAddArgs {
            obra,
            rating,
            comment,
        }) => {
            let all = reviews.add(&obra, rating, &comment).await?;
            println!("{}", summary_line(&summarize(&all)));
        }
        ReviewsCommand::List(ReviewsTarget { obra, json }) => {
            let all = reviews.list(&obra).await?;
            if json {
                for review in newest_first(&all) {
                    println!("{}", serde_json::to_string(review)?);
                }
                return Ok(());
            }
            println!("{}", summary_line(&summarize(&all)));
            if all.is_empty() {
                println!("Seja o primeiro a avaliar esta obra.");
            }
            for review in newest_first(&all) {
                println!(
                    "{}★ {}  {}",
                    review.rating,
                    review.created_at.format("%Y-%m-%d %H:%M"),
                    review.comment
                );
            }
        }
        ReviewsCommand::Clear(ReviewsTarget { obra, .. }) => {
            reviews.clear(&obra).await?;
            println!("Avaliações locais de {obra} apagadas.");
        }
    }
    Ok(())
}

pub fn summary_line(summary: &ReviewSummary) -> String {
    if summary.total == 0 {
        return "Sem avaliações".to_owned();
    }
    format!(
        "{}% aprov. · média {:.1} · {} avaliação(ões)",
        summary.percent, summary.average, summary.total
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;
    use crate::kv_store::MemoryKvStore;

    fn review(rating: u8) -> ReviewRecord {
        ReviewRecord {
            rating,
            comment: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        assert_eq!(
            summarize(&[]),
            ReviewSummary {
                percent: 0,
                average: 0.0,
                total: 0
            }
        );
        assert_eq!(summary_line(&summarize(&[])), "Sem avaliações");
    }

    #[test]
    fn summary_rounds_percent_and_average() {
        let reviews = [review(5), review(4), review(2)];
        let summary = summarize(&reviews);
        assert_eq!(summary.percent, 67);
        assert_eq!(summary.average, 3.7);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn subject_prefers_slug_then_id() {
        let mut work = crate::filter::tests::work("Livro", "2020", "conto");
        assert_eq!(review_subject(&work), "livro");
        work.slug.clear();
        assert_eq!(review_subject(&work), "unknown");
        work.id = Some("abc123".to_owned());
        assert_eq!(review_subject(&work), "abc123");
    }

    #[tokio::test]
    async fn add_list_clear() {
        let store = Arc::new(MemoryKvStore::new());
        let reviews = Reviews::new(store.clone());

        reviews.add("livro-x", 5, "  Lindo!  ").await.unwrap();
        let all = reviews.add("livro-x", 3, "").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].comment, "Lindo!");

        let listed = reviews.list("livro-x").await.unwrap();
        assert_eq!(listed, all);
        assert_eq!(newest_first(&listed)[0].rating, 3);
        assert!(reviews.list("outro").await.unwrap().is_empty());

        let raw = store.get("reviews:livro-x").await.unwrap().unwrap();
        assert!(raw.contains("\"createdAt\""));

        reviews.clear("livro-x").await.unwrap();
        assert!(reviews.list("livro-x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rating_out_of_range_is_rejected() {
        let reviews = Reviews::new(Arc::new(MemoryKvStore::new()));
        assert!(reviews.add("x", 0, "").await.is_err());
        assert!(reviews.add("x", 6, "").await.is_err());
        assert!(reviews.list("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_empty_and_is_replaced() {
        let store = Arc::new(MemoryKvStore::new());
        store.set("reviews:x", "{not json").await.unwrap();
        let reviews = Reviews::new(store);

        assert!(reviews.list("x").await.unwrap().is_empty());
        let all = reviews.add("x", 4, "ok").await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
