//! End-to-end run: index -> parallel chapter fetch -> EPUB.

use crate::config::PipelineConfig;
use crate::dispatch::Dispatcher;
use crate::epub::{write_epub, EpubError};
use crate::model::{Book, ChapterStub};
use crate::scraper::{list_chapters, ContentFetcher, FetchObserver, PageSource, SiteMarkup};
use std::path::PathBuf;
use tracing::{info, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The index yielded no chapters; nothing was fetched or written.
    NoChapters,
    Written { path: PathBuf, chapters: usize },
}

/// Wires a page source, markup adapter and observer to the configured dispatcher and writer.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn PageSource,
    markup: &'a dyn SiteMarkup,
    observer: &'a dyn FetchObserver,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        source: &'a dyn PageSource,
        markup: &'a dyn SiteMarkup,
        observer: &'a dyn FetchObserver,
    ) -> Self {
        Self {
            config,
            source,
            markup,
            observer,
        }
    }

    /// Fetch the chapter index. Empty on any failure.
    pub fn list_chapters(&self) -> Vec<ChapterStub> {
        list_chapters(self.source, self.markup, &self.config.index_url)
    }

    /// Fill every stub's content using the configured worker count and retry policy.
    pub fn fetch_chapters(
        &self,
        stubs: Vec<ChapterStub>,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Vec<ChapterStub> {
        let fetcher = ContentFetcher::new(
            self.source,
            self.markup,
            self.config.retry_policy(),
            self.observer,
        );
        let dispatcher = Dispatcher::new(self.config.workers);
        info!(
            chapters = stubs.len(),
            workers = dispatcher.workers(),
            "downloading chapters"
        );
        dispatcher.populate(stubs, |url| fetcher.fetch(url), progress)
    }

    /// Build the book from populated stubs and write it to the output directory.
    pub fn assemble(&self, stubs: Vec<ChapterStub>) -> Result<PathBuf, EpubError> {
        let book = Book::from_stubs(
            self.config.title.clone(),
            self.config.author.clone(),
            self.config.language.clone(),
            Some(self.config.index_url.clone()),
            stubs,
        );
        info!(chapters = book.chapters.len(), "building EPUB");
        write_epub(&book, &self.config.output_dir)
    }

    /// Index, fetch, assemble. Stops cleanly with [RunOutcome::NoChapters] when the index
    /// yields nothing; chapter failures never stop the run.
    pub fn run(&self, progress: Option<&dyn Fn(usize, usize)>) -> Result<RunOutcome, EpubError> {
        info!(url = %self.config.index_url, "fetching chapter index");
        let stubs = self.list_chapters();
        if stubs.is_empty() {
            warn!("no chapters found, nothing to do");
            return Ok(RunOutcome::NoChapters);
        }
        let stubs = self.fetch_chapters(stubs, progress);
        let chapters = stubs.len();
        let path = self.assemble(stubs)?;
        info!(path = %path.display(), "EPUB written");
        Ok(RunOutcome::Written { path, chapters })
    }
}
