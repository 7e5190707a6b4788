use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, DedupKey, SaveOutcome};

use super::schema::{self, ARTICLE_COLUMNS};

/// SQLite-backed article table. Every call runs on the single connection
/// thread owned by `tokio_rusqlite`, so saves never interleave.
pub struct ArticleStore {
    conn: Connection,
    retention_days: u32,
}

impl ArticleStore {
    pub async fn open(db_path: impl AsRef<Path>, retention_days: u32) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).await?;
        Self::init(conn, retention_days).await
    }

    pub async fn open_in_memory(retention_days: u32) -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, retention_days).await
    }

    async fn init(conn: Connection, retention_days: u32) -> Result<Self> {
        let store = Self {
            conn,
            retention_days,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                schema::migrate(conn)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Insert the articles not already stored, then sweep expired rows.
    ///
    /// Duplicates inside `batch` are collapsed as well: the first occurrence
    /// is inserted and later ones are counted as skipped. The duplicate check
    /// and the insert share one transaction, so a failed insert leaves the
    /// table untouched and the error is returned.
    pub async fn save(&self, batch: Vec<Article>) -> Result<SaveOutcome> {
        if batch.is_empty() {
            return Ok(SaveOutcome::default());
        }

        let (skipped, added) = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                schema::migrate(&tx)?;

                let mut seen: HashSet<DedupKey> = {
                    let mut stmt = tx.prepare("SELECT title, summary, link FROM articles")?;
                    let keys = stmt
                        .query_map([], key_from_row)?
                        .collect::<std::result::Result<HashSet<_>, _>>()?;
                    keys
                };

                let mut skipped = 0u64;
                let mut added = 0u64;
                {
                    let mut insert = tx.prepare(&format!(
                        "INSERT INTO articles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        ARTICLE_COLUMNS
                    ))?;

                    for article in &batch {
                        if !seen.insert(article.dedup_key()) {
                            skipped += 1;
                            continue;
                        }
                        insert.execute(params![
                            article.title,
                            article.summary,
                            article.link,
                            article.published.map(format_timestamp),
                            article.feed,
                            article.translated_summary,
                            article.content,
                            article.word_count,
                            article.scraped_at.map(format_timestamp),
                            article.mentioned_topics,
                            article.mentioned_entities,
                        ])?;
                        added += 1;
                    }
                }

                tx.commit()?;
                Ok((skipped, added))
            })
            .await?;

        let deleted = self.cleanup_old(self.retention_days).await?;

        tracing::info!(
            "Saved articles: added {}, skipped {}, deleted {}",
            added,
            skipped,
            deleted
        );

        Ok(SaveOutcome {
            deleted,
            skipped,
            added,
        })
    }

    /// Delete rows published more than `max_age_days` ago. Rows without a
    /// publish time are kept.
    pub async fn cleanup_old(&self, max_age_days: u32) -> Result<u64> {
        let cutoff = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(max_age_days)))
            .map(format_timestamp)
            .ok_or_else(|| {
                AppError::Config(format!("retention of {} days is out of range", max_age_days))
            })?;
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM articles WHERE julianday(published) < julianday(?1)",
                    params![cutoff],
                )?;
                Ok(deleted as u64)
            })
            .await?;

        if deleted > 0 {
            tracing::info!("Removed {} articles older than {} days", deleted, max_age_days);
        }
        Ok(deleted)
    }

    /// Drop every row and recreate an empty table. Returns the previous count.
    pub async fn delete_all(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let count: i64 = if schema::table_exists(&tx)? {
                    tx.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?
                } else {
                    0
                };
                tx.execute_batch("DROP TABLE IF EXISTS articles")?;
                tx.pragma_update(None, "user_version", 0)?;
                schema::migrate(&tx)?;
                tx.commit()?;
                Ok(count as u64)
            })
            .await?;

        tracing::warn!("Deleted all {} stored articles", count);
        Ok(count)
    }

    pub async fn load_latest(&self, n: usize) -> Result<Vec<Article>> {
        let limit = n as i64;
        let articles = self
            .conn
            .call(move |conn| {
                if !schema::table_exists(conn)? {
                    return Ok(Vec::new());
                }
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles ORDER BY julianday(published) DESC NULLS LAST LIMIT ?1",
                    ARTICLE_COLUMNS
                ))?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Case-insensitive title search, newest first.
    pub async fn search(&self, term: &str, n: usize) -> Result<Vec<Article>> {
        let term = term.to_lowercase();
        let limit = n as i64;
        let articles = self
            .conn
            .call(move |conn| {
                if !schema::table_exists(conn)? {
                    return Ok(Vec::new());
                }
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM articles WHERE instr(lower(title), ?1) > 0 \
                     ORDER BY julianday(published) DESC NULLS LAST LIMIT ?2",
                    ARTICLE_COLUMNS
                ))?;
                let articles = stmt
                    .query_map(params![term, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn count(&self) -> Result<u64> {
        let count = self
            .conn
            .call(|conn| {
                if !schema::table_exists(conn)? {
                    return Ok(0);
                }
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await?;
        Ok(count)
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn key_from_row(row: &Row) -> rusqlite::Result<DedupKey> {
    let title: Option<String> = row.get(0)?;
    let summary: Option<String> = row.get(1)?;
    let link: Option<String> = row.get(2)?;
    Ok(DedupKey::new(
        title.as_deref(),
        summary.as_deref(),
        link.as_deref(),
    ))
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        summary: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        link: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        published: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| parse_datetime(&s)),
        feed: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        translated_summary: row.get(5)?,
        content: row.get(6)?,
        word_count: row.get(7)?,
        scraped_at: row
            .get::<_, Option<String>>(8)?
            .and_then(|s| parse_datetime(&s)),
        mentioned_topics: row.get(9)?,
        mentioned_entities: row.get(10)?,
    })
}
