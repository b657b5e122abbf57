//! novelscrape: download a web novel's chapter index and chapters in parallel, write one EPUB.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod epub;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use config::PipelineConfig;
pub use dispatch::Dispatcher;
pub use epub::{write_epub, EpubError};
pub use model::{Book, Chapter, ChapterStub, FetchOutcome};
pub use pipeline::{Pipeline, RunOutcome};
pub use scraper::{
    list_chapters, ContentFetcher, FetchError, FetchObserver, HttpSource, PageKind, PageSource,
    RetryPolicy, ScraperError, SelectorMarkup, SiteMarkup,
};
