use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::ScrapeResult;

const USER_AGENT_STRING: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MIN_BLOCK_LENGTH: usize = 30;
const MIN_LINE_LENGTH: usize = 50;
const MIN_CONTENT_BLOCKS: usize = 2;
const MAX_LIST_LINE_LENGTH: usize = 80;

const BOILERPLATE_KEYWORDS: [&str; 9] = [
    "advertisement",
    "cookie",
    "gdpr",
    "subscribe",
    "reklame",
    "pro indhold",
    "læs mere og bli",
    "nyhedsbreve",
    "menu",
];

const STRIPPED_ELEMENTS: &str = "script, style, nav, footer, header, aside";

const CONTAINER_SELECTORS: [&str; 9] = [
    "article",
    ".article-content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-body",
    ".story-content",
    "main",
    ".main-content",
];

const TITLE_SELECTORS: [&str; 4] = ["h1", ".headline", ".title", ".article-title"];

pub const TOPICS_MARKER: &str = "nævnte emner";
pub const ENTITIES_MARKER: &str = "nævnte virksomheder";
const LIST_MARKERS: [&str; 2] = [TOPICS_MARKER, ENTITIES_MARKER];

/// Elements that end the current run of lines. List items are left out so a
/// whole list reads as one run.
const BLOCK_ELEMENTS: [&str; 16] = [
    "p", "div", "section", "article", "main", "ul", "ol", "dl", "table", "figure",
    "h1", "h2", "h3", "h4", "h5", "h6",
];

pub struct ContentScraper {
    client: Client,
}

impl ContentScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT_STRING)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch an article page and extract its text. Never fails: problems are
    /// reported through `ScrapeResult::error`.
    pub async fn scrape(&self, article_url: &str) -> ScrapeResult {
        let url = match Url::parse(article_url) {
            Ok(u) => u,
            Err(e) => return ScrapeResult::failed(format!("Invalid URL: {}", e)),
        };

        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", article_url, e);
                return ScrapeResult::failed(format!("Network error: {}", e));
            }
        };

        extract_article(&html)
    }

    async fn fetch_html(&self, url: Url) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP {}", status).into());
        }

        Ok(response.text().await?)
    }
}

/// Extract title, body text and the "Nævnte ..." lists from an article page.
pub fn extract_article(html: &str) -> ScrapeResult {
    let mut document = Html::parse_document(html);
    strip_elements(&mut document);
    let root = document.root_element();

    let Some(container) = find_container(root) else {
        return ScrapeResult::failed("Could not find article content");
    };

    let title = extract_title(root);
    let content = extract_content(container);
    let page_text = visible_lines(root);

    ScrapeResult {
        title,
        word_count: content.split_whitespace().count(),
        content,
        mentioned_topics: extract_marked_list(&page_text, TOPICS_MARKER),
        mentioned_entities: extract_marked_list(&page_text, ENTITIES_MARKER),
        scraped_at: Utc::now(),
        error: None,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn url_line() -> &'static Regex {
    static URL_LINE: OnceLock<Regex> = OnceLock::new();
    URL_LINE.get_or_init(|| Regex::new(r"^(https?://|www\.)\S+$").expect("valid regex"))
}

/// Detach scripts, styles and page chrome so later selections skip them.
fn strip_elements(document: &mut Html) {
    let Some(unwanted) = selector(STRIPPED_ELEMENTS) else {
        return;
    };

    let ids: Vec<_> = document
        .root_element()
        .select(&unwanted)
        .map(|el| el.id())
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn find_container(root: ElementRef<'_>) -> Option<ElementRef<'_>> {
    CONTAINER_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|css| selector(css))
        .find_map(|sel| root.select(&sel).next())
}

fn extract_title(root: ElementRef<'_>) -> String {
    TITLE_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| root.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_content(container: ElementRef<'_>) -> String {
    let mut blocks: Vec<String> = match selector("p") {
        Some(paragraph) => container
            .select(&paragraph)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|text| is_content_text(text, MIN_BLOCK_LENGTH))
            .collect(),
        None => Vec::new(),
    };

    if blocks.len() < MIN_CONTENT_BLOCKS {
        blocks = container
            .text()
            .collect::<String>()
            .split('\n')
            .map(str::trim)
            .filter(|line| is_content_text(line, MIN_LINE_LENGTH))
            .map(String::from)
            .collect();
    }

    collapse_whitespace(&blocks.join("\n\n"))
}

fn is_content_text(text: &str, min_length: usize) -> bool {
    if text.chars().count() <= min_length {
        return false;
    }
    let lower = text.to_lowercase();
    !BOILERPLATE_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One line per non-blank text node, in document order, with a blank line
/// wherever a block element opens or closes.
fn visible_lines(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    push_lines(root, &mut lines);
    lines.join("\n")
}

fn push_lines(element: ElementRef<'_>, lines: &mut Vec<String>) {
    let block = BLOCK_ELEMENTS.contains(&element.value().name());
    if block {
        push_break(lines);
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            push_lines(child_element, lines);
        } else if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }

    if block {
        push_break(lines);
    }
}

fn push_break(lines: &mut Vec<String>) {
    if lines.last().is_some_and(|line| !line.is_empty()) {
        lines.push(String::new());
    }
}

fn marker_of(line: &str) -> Option<&'static str> {
    if line.chars().count() > MAX_LIST_LINE_LENGTH {
        return None;
    }
    let lower = line.to_lowercase();
    LIST_MARKERS
        .iter()
        .copied()
        .find(|marker| lower.starts_with(marker))
}

/// Collect the lines listed under `marker`, joined with ", ".
///
/// Blank lines right after the marker are skipped. Collection stops at the
/// next blank line, the next marker, or a line too long to be a list item.
/// URL-only lines are ignored.
pub fn extract_marked_list(text: &str, marker: &str) -> String {
    let mut collecting = false;
    let mut items: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if let Some(found) = marker_of(line) {
            if collecting {
                break;
            }
            collecting = found == marker;
            continue;
        }
        if !collecting {
            continue;
        }
        if line.is_empty() {
            if items.is_empty() {
                continue;
            }
            break;
        }
        if line.chars().count() > MAX_LIST_LINE_LENGTH {
            break;
        }
        if url_line().is_match(line) {
            continue;
        }
        items.push(line);
    }

    items.join(", ")
}
