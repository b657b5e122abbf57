//! Run configuration. `PipelineConfig` carries every tunable with its default; an optional
//! config file can override any of them. Search order: ./novelscrape.toml, then
//! $XDG_CONFIG_HOME/novelscrape/config.toml (or ~/.config/novelscrape/config.toml).

use crate::dispatch::DEFAULT_WORKERS;
use crate::scraper::markup::{DEFAULT_CONTENT_SELECTOR, DEFAULT_LISTING_SELECTOR};
use crate::scraper::retry::DEFAULT_MAX_ATTEMPTS;
use crate::scraper::{
    HttpSource, RetryPolicy, ScraperError, SelectorMarkup, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_INDEX_URL: &str = "https://www.biquge321.com/xiaoshuo/508318/";
pub const DEFAULT_OUTPUT_DIR: &str = "books";
pub const DEFAULT_TITLE: &str = "斗破苍穹";
pub const DEFAULT_AUTHOR: &str = "天蚕土豆";
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

/// Everything a run needs, with defaults for the one site this tool was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Chapter index (listing) page.
    pub index_url: String,
    /// Concurrent chapter fetches.
    pub workers: usize,
    /// Attempts per chapter before giving up.
    pub max_attempts: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent for the index request.
    pub user_agent: String,
    /// Directory the EPUB is written to, relative to the working directory.
    pub output_dir: PathBuf,
    /// Book title. Also the output file name.
    pub title: String,
    pub author: String,
    pub language: String,
    /// CSS selector for the chapter listing container on the index page.
    pub listing_selector: String,
    /// CSS selector for the text container on chapter pages.
    pub content_selector: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            workers: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            listing_selector: DEFAULT_LISTING_SELECTOR.to_string(),
            content_selector: DEFAULT_CONTENT_SELECTOR.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by whatever keys `file` sets.
    pub fn from_file(file: Option<&Config>) -> Self {
        let mut config = Self::default();
        if let Some(file) = file {
            config.apply(file);
        }
        config
    }

    /// Override fields with the keys present in `file`.
    pub fn apply(&mut self, file: &Config) {
        if let Some(ref v) = file.index_url {
            self.index_url = v.clone();
        }
        if let Some(v) = file.workers {
            self.workers = v;
        }
        if let Some(v) = file.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = file.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(ref v) = file.user_agent {
            self.user_agent = v.clone();
        }
        if let Some(ref v) = file.output_dir {
            self.output_dir = v.clone();
        }
        if let Some(ref v) = file.title {
            self.title = v.clone();
        }
        if let Some(ref v) = file.author {
            self.author = v.clone();
        }
        if let Some(ref v) = file.language {
            self.language = v.clone();
        }
        if let Some(ref v) = file.listing_selector {
            self.listing_selector = v.clone();
        }
        if let Some(ref v) = file.content_selector {
            self.content_selector = v.clone();
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    pub fn markup(&self) -> Result<SelectorMarkup, ScraperError> {
        SelectorMarkup::new(&self.listing_selector, &self.content_selector)
    }

    pub fn http_source(&self) -> Result<HttpSource, reqwest::Error> {
        HttpSource::builder()
            .index_user_agent(self.user_agent.clone())
            .timeout_secs(self.timeout_secs)
            .build()
    }
}

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    pub index_url: Option<String>,
    pub workers: Option<usize>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    /// User-Agent sent with the index request.
    pub user_agent: Option<String>,
    /// Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub listing_selector: Option<String>,
    pub content_selector: Option<String>,
}

/// Search order: (1) ./novelscrape.toml, (2) $XDG_CONFIG_HOME/novelscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("novelscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("novelscrape").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}
