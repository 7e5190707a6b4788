use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScrapeResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub summary: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub feed: String,
    pub translated_summary: Option<String>,
    pub content: Option<String>,
    pub word_count: Option<i64>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub mentioned_topics: Option<String>,
    pub mentioned_entities: Option<String>,
}

/// The (title, summary, link) identity of an article. Missing values are
/// stored as empty strings so that NULL and "" compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    title: String,
    summary: String,
    link: String,
}

impl DedupKey {
    pub fn new(title: Option<&str>, summary: Option<&str>, link: Option<&str>) -> Self {
        Self {
            title: title.unwrap_or_default().to_string(),
            summary: summary.unwrap_or_default().to_string(),
            link: link.unwrap_or_default().to_string(),
        }
    }
}

impl Article {
    /// Build a candidate from a feed entry, before scraping or translation.
    pub fn candidate(
        title: impl Into<String>,
        summary: impl Into<String>,
        link: impl Into<String>,
        published: DateTime<Utc>,
        feed: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            link: link.into(),
            published: Some(published),
            feed: feed.into(),
            translated_summary: None,
            content: None,
            word_count: None,
            scraped_at: None,
            mentioned_topics: None,
            mentioned_entities: None,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(Some(&self.title), Some(&self.summary), Some(&self.link))
    }

    /// Return the article enriched with scraped content. A failed scrape
    /// leaves the article as it was.
    pub fn with_scrape(self, result: &ScrapeResult) -> Self {
        if result.error.is_some() {
            return self;
        }

        Self {
            content: Some(result.content.clone()),
            word_count: Some(result.word_count as i64),
            scraped_at: Some(result.scraped_at),
            mentioned_topics: Some(result.mentioned_topics.clone()),
            mentioned_entities: Some(result.mentioned_entities.clone()),
            ..self
        }
    }

    pub fn with_translation(self, translated_summary: String) -> Self {
        Self {
            translated_summary: Some(translated_summary),
            ..self
        }
    }
}

/// Collapse articles sharing a dedup key, keeping the last occurrence of each.
pub fn dedup_keep_last(articles: Vec<Article>) -> Vec<Article> {
    let mut last_seen: HashMap<DedupKey, usize> = HashMap::new();
    for (index, article) in articles.iter().enumerate() {
        last_seen.insert(article.dedup_key(), index);
    }

    articles
        .into_iter()
        .enumerate()
        .filter(|(index, article)| last_seen.get(&article.dedup_key()) == Some(index))
        .map(|(_, article)| article)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn article(title: &str, summary: &str, link: &str, feed: &str) -> Article {
        Article::candidate(title, summary, link, Utc::now(), feed)
    }

    #[test]
    fn dedup_keeps_the_later_entry() {
        let articles = vec![
            article("A", "S1", "L1", "feed-1"),
            article("B", "S2", "L2", "feed-1"),
            article("A", "S1", "L1", "feed-2"),
        ];

        let deduped = dedup_keep_last(articles);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "B");
        assert_eq!(deduped[1].title, "A");
        assert_eq!(deduped[1].feed, "feed-2");
    }

    #[test]
    fn missing_and_empty_values_share_a_key() {
        let from_row = DedupKey::new(Some("A"), None, Some("L1"));
        let candidate = article("A", "", "L1", "feed");
        assert_eq!(from_row, candidate.dedup_key());
    }

    #[test]
    fn failed_scrape_leaves_article_untouched() {
        let original = article("A", "S1", "L1", "feed");
        let result = ScrapeResult::failed("HTTP 404 Not Found");

        let enriched = original.clone().with_scrape(&result);

        assert_eq!(enriched, original);
    }

    #[test]
    fn successful_scrape_fills_content_fields() {
        let scraped_at = Utc::now() - Duration::minutes(1);
        let result = ScrapeResult {
            title: "Overskrift".to_string(),
            content: "en to tre".to_string(),
            word_count: 3,
            mentioned_topics: "Energi, Aktier".to_string(),
            mentioned_entities: String::new(),
            scraped_at,
            error: None,
        };

        let enriched = article("A", "S1", "L1", "feed").with_scrape(&result);

        assert_eq!(enriched.content.as_deref(), Some("en to tre"));
        assert_eq!(enriched.word_count, Some(3));
        assert_eq!(enriched.scraped_at, Some(scraped_at));
        assert_eq!(enriched.mentioned_topics.as_deref(), Some("Energi, Aktier"));
    }
}
