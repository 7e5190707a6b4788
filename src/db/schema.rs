use std::collections::HashSet;

use rusqlite::Connection;

/// Bumped whenever a column is added to `OPTIONAL_COLUMNS`.
pub const SCHEMA_VERSION: i64 = 2;

pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    title TEXT,
    summary TEXT,
    link TEXT,
    published TEXT,
    feed TEXT,
    translated_summary TEXT,
    content TEXT,
    word_count INTEGER,
    scraped_at TEXT,
    mentioned_topics TEXT,
    mentioned_entities TEXT
);
"#;

pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published DESC);
CREATE INDEX IF NOT EXISTS idx_articles_link ON articles(link);
"#;

/// Columns that older stores may lack. Added as nullable, never dropped.
pub const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("feed", "TEXT"),
    ("translated_summary", "TEXT"),
    ("content", "TEXT"),
    ("word_count", "INTEGER"),
    ("scraped_at", "TEXT"),
    ("mentioned_topics", "TEXT"),
    ("mentioned_entities", "TEXT"),
];

pub const ARTICLE_COLUMNS: &str = "title, summary, link, published, feed, translated_summary, \
     content, word_count, scraped_at, mentioned_topics, mentioned_entities";

pub fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'articles'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_names(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('articles')")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(names)
}

fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Bring the `articles` table up to `SCHEMA_VERSION`. Safe to run any
/// number of times; existing rows keep their data and new columns read as NULL.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    if table_exists(conn)? && user_version(conn)? >= SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(SCHEMA)?;

    let existing = column_names(conn)?;
    for (name, sql_type) in OPTIONAL_COLUMNS {
        if !existing.contains(*name) {
            conn.execute_batch(&format!(
                "ALTER TABLE articles ADD COLUMN {} {}",
                name, sql_type
            ))?;
            tracing::info!("Added missing column articles.{}", name);
        }
    }

    conn.execute_batch(INDEXES)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
