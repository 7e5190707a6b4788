use std::path::Path;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;

use crate::ai::TranslationDispatcher;
use crate::config::Config;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::feed::{FeedPoller, PollReport};
use crate::models::{
    Article, ArticleError, ProviderStatus, RunSummary, SaveOutcome, ScrapeResult, Stage, TextKind,
    TranslationMethod,
};
use crate::services::ContentScraper;

/// Per-run switches; defaults come from the config.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub method: TranslationMethod,
    pub scrape: bool,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            method: config.translation_method,
            scrape: config.scrape_enabled,
        }
    }
}

/// Poll, scrape, translate and persist in one run.
pub struct Pipeline {
    config: Config,
    poller: FeedPoller,
    scraper: ContentScraper,
    translator: TranslationDispatcher,
    store: ArticleStore,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub async fn new(config: Config) -> Result<Self> {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = ArticleStore::open(&config.db_path, config.retention_days).await?;
        let translator = TranslationDispatcher::from_config(&config)?;
        Self::from_parts(config, store, translator)
    }

    pub fn from_parts(
        config: Config,
        store: ArticleStore,
        translator: TranslationDispatcher,
    ) -> Result<Self> {
        config.validate()?;
        let poller = FeedPoller::new()?;
        let scraper = ContentScraper::new(Duration::from_secs(config.scrape_timeout_secs))?;

        Ok(Self {
            config,
            poller,
            scraper,
            translator,
            store,
            run_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translation_status(&self, method: TranslationMethod) -> ProviderStatus {
        self.translator.status(method)
    }

    /// Run once, waiting for any run already in progress.
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let _guard = self.run_lock.lock().await;
        self.run_exclusive(options).await
    }

    /// Run once unless another run holds the pipeline, in which case `None`.
    pub async fn try_run(&self, options: RunOptions) -> Option<Result<RunSummary>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::info!("Pipeline run already in progress, skipping");
            return None;
        };
        Some(self.run_exclusive(options).await)
    }

    async fn run_exclusive(&self, options: RunOptions) -> Result<RunSummary> {
        let mut summary = RunSummary {
            translation_status: self.translator.status(options.method),
            ..RunSummary::default()
        };

        tracing::info!("{:?}: {} feeds", Stage::Polling, self.config.feeds.len());
        let report = self.fetch_articles().await?;
        if !self.config.feeds.is_empty() && report.failed_feeds.len() == self.config.feeds.len() {
            return Err(AppError::AllFeedsFailed(report.failed_feeds.len()));
        }
        for (feed, message) in report.failed_feeds {
            summary.errors.push(ArticleError {
                link: feed,
                stage: Stage::Polling,
                message,
            });
        }

        let mut articles = report.articles;
        summary.fetched = articles.len();
        if articles.is_empty() {
            tracing::info!("No recent articles in any feed");
            return Ok(summary);
        }

        if options.scrape {
            tracing::info!("{:?}: {} articles", Stage::Scraping, articles.len());
            articles = self.scrape_all(articles, &mut summary).await;
        }

        articles = self.translate_all(articles, options.method, &mut summary).await;

        tracing::info!("{:?}: {} articles", Stage::Persisting, articles.len());
        let outcome = self.save_to_db(articles).await?;
        summary.added = outcome.added;
        summary.skipped = outcome.skipped;
        summary.deleted_by_retention = outcome.deleted;

        tracing::info!(
            "Run finished: fetched {}, scraped {}, translated {}, added {}, skipped {}, {} errors",
            summary.fetched,
            summary.scraped,
            summary.translated,
            summary.added,
            summary.skipped,
            summary.errors.len()
        );
        Ok(summary)
    }

    async fn scrape_all(&self, articles: Vec<Article>, summary: &mut RunSummary) -> Vec<Article> {
        let links: Vec<String> = articles.iter().map(|a| a.link.clone()).collect();
        let results: Vec<ScrapeResult> = stream::iter(links)
            .map(move |link| async move { self.scrape_one(&link).await })
            .buffered(self.config.worker_concurrency)
            .collect()
            .await;

        let mut enriched = Vec::with_capacity(articles.len());
        for (article, result) in articles.into_iter().zip(results) {
            match &result.error {
                Some(reason) => summary.errors.push(ArticleError {
                    link: article.link.clone(),
                    stage: Stage::Scraping,
                    message: reason.clone(),
                }),
                None => summary.scraped += 1,
            }
            enriched.push(article.with_scrape(&result));
        }
        enriched
    }

    async fn scrape_one(&self, link: &str) -> ScrapeResult {
        let result = self.scraper.scrape(link).await;
        tokio::time::sleep(Duration::from_millis(self.config.scrape_delay_ms)).await;
        result
    }

    /// Fill `translated_summary` for every article. Articles whose
    /// translation fails keep their original summary.
    async fn translate_all(
        &self,
        articles: Vec<Article>,
        method: TranslationMethod,
        summary: &mut RunSummary,
    ) -> Vec<Article> {
        if summary.translation_status != ProviderStatus::Ready {
            if summary.translation_status == ProviderStatus::NoApiKey {
                tracing::warn!("No API key for {}, storing untranslated summaries", method);
            }
            return articles
                .into_iter()
                .map(|article| {
                    let original = article.summary.clone();
                    article.with_translation(original)
                })
                .collect();
        }

        tracing::info!("{:?}: {} articles with {}", Stage::Translating, articles.len(), method);
        let summaries: Vec<String> = articles.iter().map(|a| a.summary.clone()).collect();
        let results: Vec<Result<String>> = stream::iter(summaries)
            .map(move |text| async move {
                self.translator
                    .try_translate(&text, method, TextKind::Content)
                    .await
            })
            .buffered(self.config.worker_concurrency)
            .collect()
            .await;

        let mut translated = Vec::with_capacity(articles.len());
        for (article, result) in articles.into_iter().zip(results) {
            let text = match result {
                Ok(text) => {
                    if !article.summary.trim().is_empty() {
                        summary.translated += 1;
                    }
                    text
                }
                Err(e) => {
                    tracing::warn!("Failed to translate {}: {}", article.link, e);
                    summary.errors.push(ArticleError {
                        link: article.link.clone(),
                        stage: Stage::Translating,
                        message: e.to_string(),
                    });
                    article.summary.clone()
                }
            };
            translated.push(article.with_translation(text));
        }
        translated
    }

    /// Poll the configured feeds for articles inside the recency window.
    pub async fn fetch_articles(&self) -> Result<PollReport> {
        let hours = self.config.recency_hours;
        let cutoff = Utc::now()
            .checked_sub_signed(ChronoDuration::hours(i64::from(hours)))
            .ok_or_else(|| AppError::Config(format!("recency window of {} hours is out of range", hours)))?;
        Ok(self.poller.poll(&self.config.feeds, cutoff).await)
    }

    pub async fn translate_text(
        &self,
        text: &str,
        method: TranslationMethod,
        kind: TextKind,
    ) -> String {
        self.translator.translate(text, method, kind).await
    }

    pub async fn save_to_db(&self, articles: Vec<Article>) -> Result<SaveOutcome> {
        self.store.save(articles).await
    }

    pub async fn load_latest(&self, n: usize) -> Result<Vec<Article>> {
        self.store.load_latest(n).await
    }

    pub async fn search(&self, term: &str, n: usize) -> Result<Vec<Article>> {
        self.store.search(term, n).await
    }

    pub async fn cleanup_old_articles(&self, max_age_days: u32) -> Result<u64> {
        self.store.cleanup_old(max_age_days).await
    }

    pub async fn delete_all_articles(&self) -> Result<u64> {
        self.store.delete_all().await
    }
}
