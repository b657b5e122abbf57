//! CLI parsing and orchestration. Builds the run configuration (defaults, then config file,
//! then flags), runs index -> fetch -> EPUB, and maps errors to exit codes.

use crate::config::{self, PipelineConfig};
use crate::logging;
use crate::epub::{epub_path, EpubError};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::scraper::{try_list_chapters, LogObserver, ScraperError};
use clap::Parser;
use reqwest::Url;
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Epub(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelscrape")]
#[command(about = "Download a web novel's chapters in parallel and write one EPUB")]
#[command(
    after_help = "Config file keys (index_url, workers, max_attempts, timeout_secs, user_agent, output_dir, title, author, language, listing_selector, content_selector) are read from ./novelscrape.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Chapter index page URL. Default: the configured index_url.
    pub url: Option<String>,

    /// Output directory (created if missing). Default: ./books.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Book title; also the output file name.
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    /// Concurrent chapter downloads (default 5).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Attempts per chapter before giving up (default 100).
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Request timeout in seconds (default 15).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and full error chain.
    #[arg(long)]
    pub verbose: bool,

    /// Fetch the index only, print chapter count and output path without downloading.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Apply flags on top of `config`.
    fn apply_to(&self, config: &mut PipelineConfig) {
        if let Some(ref url) = self.url {
            config.index_url = url.clone();
        }
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(ref title) = self.title {
            config.title = title.clone();
        }
        if let Some(ref author) = self.author {
            config.author = author.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if let Some(secs) = self.timeout {
            config.timeout_secs = secs;
        }
    }
}

fn validate_config(config: &PipelineConfig) -> Result<(), CliRunError> {
    Url::parse(&config.index_url).map_err(|e| {
        CliRunError::InvalidInput(format!(
            "Expected an index page URL, e.g. https://www.biquge321.com/xiaoshuo/508318/ Invalid: {}: {}",
            config.index_url, e
        ))
    })?;
    if config.workers == 0 {
        return Err(CliRunError::InvalidInput(
            "Invalid workers: must be at least 1.".to_string(),
        ));
    }
    if config.max_attempts == 0 {
        return Err(CliRunError::InvalidInput(
            "Invalid max_attempts: must be at least 1.".to_string(),
        ));
    }
    if config.title.trim().is_empty() {
        return Err(CliRunError::InvalidInput(
            "Invalid title: must not be empty.".to_string(),
        ));
    }
    if config.author.trim().is_empty() {
        return Err(CliRunError::InvalidInput(
            "Invalid author: must not be empty.".to_string(),
        ));
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success, including runs that stop because
/// the index listed no chapters.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let file_config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let mut config = PipelineConfig::from_file(file_config.as_ref());
    args.apply_to(&mut config);
    validate_config(&config)?;

    let markup = config
        .markup()
        .map_err(|e| CliRunError::InvalidInput(e.to_string()))?;
    let source = config
        .http_source()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    if args.dry_run {
        let stubs = try_list_chapters(&source, &markup, &config.index_url)?;
        eprintln!("Chapters: {}", stubs.len());
        eprintln!(
            "Output: {}",
            epub_path(&config.output_dir, &config.title).display()
        );
        return Ok(());
    }

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |done: usize, total: usize| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            logging::attach_progress(&bar);
            bar
        });
        pb.set_position(done as u64);
        pb.set_message(format!("下载进度: {}/{} 章", done, total));
    };
    let progress: Option<&dyn Fn(usize, usize)> = if args.quiet { None } else { Some(&progress_cb) };

    let pipeline = Pipeline::new(&config, &source, &markup, &LogObserver);
    let outcome = pipeline.run(progress);

    if let Some(pb) = progress_state.borrow_mut().take() {
        logging::detach_progress();
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    match outcome? {
        RunOutcome::NoChapters => {
            if !args.quiet {
                eprintln!("No chapters found at {}; nothing written.", config.index_url);
            }
        }
        RunOutcome::Written { path, chapters } => {
            if !args.quiet {
                eprintln!("Wrote {} ({} chapters)", path.display(), chapters);
            }
        }
    }
    Ok(())
}
