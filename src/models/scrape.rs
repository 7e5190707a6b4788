use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of scraping one article page. Failures are carried in `error`
/// instead of being returned as `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub title: String,
    pub content: String,
    pub word_count: usize,
    pub mentioned_topics: String,
    pub mentioned_entities: String,
    pub scraped_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            word_count: 0,
            mentioned_topics: String::new(),
            mentioned_entities: String::new(),
            scraped_at: Utc::now(),
            error: Some(reason.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
