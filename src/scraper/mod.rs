//! Page fetching and extraction: the page source and markup seams, the HTTP source, the
//! retrying content fetcher, and the index fetcher.

mod client;
mod error;

pub mod content;
pub mod index;
pub mod markup;
pub mod retry;

pub use client::{HttpSource, HttpSourceBuilder, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use content::{ContentFetcher, FetchObserver, LogObserver};
pub use error::{FetchError, ScraperError};
pub use index::{list_chapters, try_list_chapters};
pub use markup::SelectorMarkup;
pub use retry::{retry_all, Backoff, RetryPolicy, RetryResult};

/// Which kind of page a request is for. The HTTP source sends its User-Agent only for
/// [PageKind::Index].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Index,
    Chapter,
}

/// Fetches a page body as text. Shared across dispatcher workers.
pub trait PageSource: Sync {
    fn fetch_page(&self, url: &str, kind: PageKind) -> Result<String, FetchError>;
}

/// One anchor from the index listing, href not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub href: String,
}

/// Site-specific markup knowledge: where the chapter listing and the chapter text live.
pub trait SiteMarkup: Sync {
    /// Anchors in the listing container in document order, or None if the container is absent.
    fn locate_listing(&self, html: &str) -> Option<Vec<ListingEntry>>;

    /// Cleaned chapter text, or None if the content container is absent.
    fn locate_content(&self, html: &str) -> Option<String>;
}
