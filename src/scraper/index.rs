//! Chapter index fetcher. One request, no retry; document order is chapter order.

use crate::model::ChapterStub;
use crate::scraper::error::ScraperError;
use crate::scraper::{PageKind, PageSource, SiteMarkup};
use reqwest::Url;
use tracing::{error, info, warn};

/// Fetch the index page and return one stub per listed chapter, hrefs resolved against
/// `index_url`. Entries whose href cannot be resolved are skipped with a warning.
pub fn try_list_chapters(
    source: &dyn PageSource,
    markup: &dyn SiteMarkup,
    index_url: &str,
) -> Result<Vec<ChapterStub>, ScraperError> {
    let base = Url::parse(index_url).map_err(|e| ScraperError::InvalidUrl {
        input: index_url.to_string(),
        reason: e.to_string(),
    })?;
    let html = source.fetch_page(index_url, PageKind::Index)?;
    let entries = markup
        .locate_listing(&html)
        .ok_or_else(|| ScraperError::ListingNotFound {
            url: index_url.to_string(),
        })?;

    let mut stubs = Vec::with_capacity(entries.len());
    for entry in entries {
        match base.join(&entry.href) {
            Ok(url) => stubs.push(ChapterStub::new(entry.title, url.to_string())),
            Err(e) => warn!(href = %entry.href, "skipping chapter link: {}", e),
        }
    }
    info!(count = stubs.len(), "chapter index parsed");
    Ok(stubs)
}

/// Like [try_list_chapters], but any failure is logged and yields an empty list. An empty
/// list tells the caller to stop the run.
pub fn list_chapters(
    source: &dyn PageSource,
    markup: &dyn SiteMarkup,
    index_url: &str,
) -> Vec<ChapterStub> {
    match try_list_chapters(source, markup, index_url) {
        Ok(stubs) => stubs,
        Err(e) => {
            error!(url = index_url, "failed to fetch chapter index: {}", e);
            Vec::new()
        }
    }
}
