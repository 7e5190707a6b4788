mod article;
mod run;
mod scrape;
mod translation;

pub use article::{dedup_keep_last, Article, DedupKey};
pub use run::{ArticleError, RunSummary, SaveOutcome, Stage};
pub use scrape::ScrapeResult;
pub use translation::{ProviderStatus, TextKind, TranslationMethod};
