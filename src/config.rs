use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::TranslationMethod;

const BORSEN_FEEDS: [&str; 16] = [
    "https://borsen.dk/rss",
    "https://borsen.dk/rss/breaking",
    "https://borsen.dk/rss/baeredygtig",
    "https://borsen.dk/rss/ejendomme",
    "https://borsen.dk/rss/finans",
    "https://borsen.dk/rss/investor",
    "https://borsen.dk/rss/ledelse",
    "https://borsen.dk/rss/longread",
    "https://borsen.dk/rss/markedsberetningen",
    "https://borsen.dk/rss/opinion",
    "https://borsen.dk/rss/pleasure",
    "https://borsen.dk/rss/politik",
    "https://borsen.dk/rss/tech",
    "https://borsen.dk/rss/utland",
    "https://borsen.dk/rss/virksomheder",
    "https://borsen.dk/rss/okonomi",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_feeds")]
    pub feeds: Vec<String>,

    /// Entries published longer ago than this are ignored by the poller.
    #[serde(default = "default_recency_hours")]
    pub recency_hours: u32,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default)]
    pub translation_method: TranslationMethod,

    #[serde(default = "default_true")]
    pub scrape_enabled: bool,

    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout_secs: u64,

    #[serde(default = "default_scrape_delay")]
    pub scrape_delay_ms: u64,

    #[serde(default = "default_translation_delay")]
    pub translation_delay_ms: u64,

    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Six-field cron expression (seconds first), evaluated in `schedule_timezone`.
    #[serde(default = "default_schedule")]
    pub schedule: String,

    /// IANA zone name for the cron schedule.
    #[serde(default = "default_schedule_timezone")]
    pub schedule_timezone: String,

    pub deepl_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub together_api_key: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("borsen-digest");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_feeds() -> Vec<String> {
    BORSEN_FEEDS.iter().map(|s| s.to_string()).collect()
}

fn default_recency_hours() -> u32 {
    24
}

fn default_retention_days() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

fn default_scrape_timeout() -> u64 {
    10
}

fn default_scrape_delay() -> u64 {
    1000
}

fn default_translation_delay() -> u64 {
    500
}

fn default_worker_concurrency() -> usize {
    2
}

fn default_schedule() -> String {
    "0 0,30 6-20 * * *".to_string()
}

fn default_schedule_timezone() -> String {
    "Europe/Copenhagen".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            feeds: default_feeds(),
            recency_hours: default_recency_hours(),
            retention_days: default_retention_days(),
            translation_method: TranslationMethod::None,
            scrape_enabled: true,
            scrape_timeout_secs: default_scrape_timeout(),
            scrape_delay_ms: default_scrape_delay(),
            translation_delay_ms: default_translation_delay(),
            worker_concurrency: default_worker_concurrency(),
            schedule: default_schedule(),
            schedule_timezone: default_schedule_timezone(),
            deepl_api_key: None,
            openai_api_key: None,
            huggingface_api_key: None,
            together_api_key: None,
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit file; it must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("borsen-digest")
            .join("config.toml")
    }

    /// Provider keys from the environment take precedence over the file.
    pub fn apply_env(&mut self) {
        let env_key = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = env_key("DEEPL_API_KEY") {
            self.deepl_api_key = Some(key);
        }
        if let Some(key) = env_key("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(key) = env_key("HUGGINGFACE_API_KEY") {
            self.huggingface_api_key = Some(key);
        }
        if let Some(key) = env_key("TOGETHER_API_KEY").or_else(|| env_key("API_KEY")) {
            self.together_api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(AppError::Config("feed list is empty".to_string()));
        }
        for feed in &self.feeds {
            url::Url::parse(feed)
                .map_err(|e| AppError::Config(format!("invalid feed URL {}: {}", feed, e)))?;
        }
        if self.retention_days == 0 {
            return Err(AppError::Config("retention_days must be at least 1".to_string()));
        }
        if self.recency_hours == 0 {
            return Err(AppError::Config("recency_hours must be at least 1".to_string()));
        }
        if self.worker_concurrency == 0 {
            return Err(AppError::Config("worker_concurrency must be at least 1".to_string()));
        }
        self.schedule_tz()?;
        Ok(())
    }

    pub fn schedule_tz(&self) -> Result<Tz> {
        self.schedule_timezone.parse::<Tz>().map_err(|e| {
            AppError::Config(format!("invalid schedule_timezone {}: {}", self.schedule_timezone, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_all_borsen_feeds() {
        let config = Config::default();
        assert_eq!(config.feeds.len(), 16);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.translation_method, TranslationMethod::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db_path = \"/tmp/articles.db\"").unwrap();
        writeln!(file, "translation_method = \"togetherai\"").unwrap();
        writeln!(file, "feeds = [\"https://example.com/rss\"]").unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.db_path, "/tmp/articles.db");
        assert_eq!(config.translation_method, TranslationMethod::TogetherAi);
        assert_eq!(config.feeds, vec!["https://example.com/rss".to_string()]);
        assert_eq!(config.recency_hours, 24);
        assert_eq!(config.schedule, "0 0,30 6-20 * * *");
        assert_eq!(config.schedule_tz().unwrap(), chrono_tz::Europe::Copenhagen);
    }

    #[test]
    fn empty_feed_list_is_rejected() {
        let config = Config {
            feeds: vec![],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn zero_retention_is_rejected() {
        let config = Config {
            retention_days: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn malformed_feed_url_is_rejected() {
        let config = Config {
            feeds: vec!["not a url".to_string()],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn unknown_schedule_timezone_is_rejected() {
        let config = Config {
            schedule_timezone: "Europe/Atlantis".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
