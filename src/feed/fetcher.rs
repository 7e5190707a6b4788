use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;

use crate::error::Result;
use crate::models::{dedup_keep_last, Article};

const MAX_CONCURRENT_FEEDS: usize = 5;

/// Candidates from one polling pass plus the feeds that could not be read.
#[derive(Debug, Default)]
pub struct PollReport {
    pub articles: Vec<Article>,
    pub failed_feeds: Vec<(String, String)>,
}

pub struct FeedPoller {
    client: Client,
}

impl FeedPoller {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("borsen-digest/1.0")
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_feed(&self, url: &str, cutoff: DateTime<Utc>) -> Result<Vec<Article>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes[..], url, cutoff)
    }

    /// Poll every feed with a small amount of concurrency. A failing feed is
    /// logged and reported, never fatal for the others.
    pub async fn poll(&self, feed_urls: &[String], cutoff: DateTime<Utc>) -> PollReport {
        let mut results: Vec<_> = stream::iter(feed_urls.iter().cloned().enumerate())
            .map(move |(index, url)| async move {
                let result = self.fetch_feed(&url, cutoff).await;
                (index, url, result)
            })
            .buffer_unordered(MAX_CONCURRENT_FEEDS)
            .collect()
            .await;

        // Later feeds must win dedup ties regardless of completion order.
        results.sort_by_key(|(index, _, _)| *index);

        let mut per_feed = Vec::with_capacity(results.len());
        let mut failed_feeds = Vec::new();
        for (_, url, result) in results {
            match result {
                Ok(articles) => {
                    tracing::debug!("Fetched {} recent articles from {}", articles.len(), url);
                    per_feed.push(articles);
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", url, e);
                    failed_feeds.push((url, e.to_string()));
                }
            }
        }

        PollReport {
            articles: merge_feeds(per_feed),
            failed_feeds,
        }
    }
}

/// Parse a feed document into candidates published at or after `cutoff`.
/// Entries without a usable date are dropped.
pub fn parse_feed(bytes: &[u8], feed_url: &str, cutoff: DateTime<Utc>) -> Result<Vec<Article>> {
    let feed = parser::parse(bytes)?;

    let articles = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(published) = entry.published.or(entry.updated) else {
                tracing::debug!("Dropping entry {} without a parseable date", entry.id);
                return None;
            };
            if published < cutoff {
                return None;
            }

            let summary = entry
                .summary
                .map(|s| summary_text(&s.content))
                .unwrap_or_default();

            Some(Article::candidate(
                entry.title.map(|t| t.content).unwrap_or_default(),
                summary,
                entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                published,
                feed_url,
            ))
        })
        .collect();

    Ok(articles)
}

/// Flatten per-feed results in feed order and drop duplicates, keeping the
/// last occurrence.
pub fn merge_feeds(per_feed: Vec<Vec<Article>>) -> Vec<Article> {
    dedup_keep_last(per_feed.into_iter().flatten().collect())
}

/// Feed summaries sometimes carry markup; reduce it to plain text.
fn summary_text(raw: &str) -> String {
    if !raw.contains('<') {
        return raw.trim().to_string();
    }
    match html2text::from_read(raw.as_bytes(), 10_000) {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(e) => {
            tracing::debug!("Failed to convert summary HTML to text: {}", e);
            raw.trim().to_string()
        }
    }
}
