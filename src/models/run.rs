use serde::{Deserialize, Serialize};

use super::ProviderStatus;

/// Counts reported by a single `ArticleStore::save` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub deleted: u64,
    pub skipped: u64,
    pub added: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Polling,
    Scraping,
    Translating,
    Persisting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleError {
    pub link: String,
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub scraped: usize,
    pub translated: usize,
    pub added: u64,
    pub skipped: u64,
    pub deleted_by_retention: u64,
    pub translation_status: ProviderStatus,
    pub errors: Vec<ArticleError>,
}

impl RunSummary {
    pub fn describe(&self) -> String {
        if self.fetched == 0 {
            return "No articles found".to_string();
        }
        format!(
            "Success: Added {}, Skipped {}",
            self.added, self.skipped
        )
    }
}
