mod content_fetcher;

pub use content_fetcher::{
    collapse_whitespace, extract_article, extract_marked_list, ContentScraper, ENTITIES_MARKER,
    TOPICS_MARKER,
};
