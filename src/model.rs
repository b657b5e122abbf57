//! Data model for a scrape run: chapter stubs filled in by the dispatcher, fetch outcomes,
//! and the finished book consumed by the EPUB writer.

/// Placeholder body when a chapter page has no content container.
pub const CONTENT_UNAVAILABLE: &str = "本章内容获取失败";

/// Placeholder body when every fetch attempt for a chapter failed.
pub const REPEATED_FAILURE: &str = "本章内容获取失败（多次尝试后失败）";

/// Placeholder body for terminal fetch errors and errors absorbed by the dispatcher.
pub const FETCH_FAILED: &str = "本章内容获取失败";

/// One chapter as listed on the index page.
///
/// `title` and `source_url` are set by the index fetcher; `content` is set exactly once by
/// the dispatcher. Identity is the stub's position in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterStub {
    pub title: String,
    pub source_url: String,
    pub content: Option<String>,
}

impl ChapterStub {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            content: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.content.is_some()
    }
}

/// Result of fetching one chapter. Every variant resolves to text via [FetchOutcome::into_text].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Extracted chapter text.
    Content(String),
    /// Page fetched but the content container was absent. Never retried.
    Missing,
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32 },
    /// Terminal error (not retryable) or an error absorbed at dispatch time.
    Failed(String),
}

impl FetchOutcome {
    pub fn into_text(self) -> String {
        match self {
            FetchOutcome::Content(text) => text,
            FetchOutcome::Missing => CONTENT_UNAVAILABLE.to_string(),
            FetchOutcome::Exhausted { .. } => REPEATED_FAILURE.to_string(),
            FetchOutcome::Failed(_) => FETCH_FAILED.to_string(),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, FetchOutcome::Content(_))
    }
}

/// Finished book: metadata plus chapters in index order.
#[derive(Debug, Clone)]
pub struct Book {
    pub title: String,
    pub author: String,
    /// BCP 47 language tag written to the package metadata (e.g. `zh-CN`).
    pub language: String,
    pub chapters: Vec<Chapter>,
    /// Index page URL. Used for the package identifier.
    pub source_url: Option<String>,
}

/// One chapter in TOC order. `body` is plain text; lines become paragraphs in the EPUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    /// 1-based order from the index.
    pub index: u32,
    pub body: String,
}

impl Book {
    /// Build a book from dispatched stubs, keeping their order. A stub the dispatcher never
    /// filled gets the generic failure text.
    pub fn from_stubs(
        title: impl Into<String>,
        author: impl Into<String>,
        language: impl Into<String>,
        source_url: Option<String>,
        stubs: Vec<ChapterStub>,
    ) -> Self {
        let chapters = stubs
            .into_iter()
            .enumerate()
            .map(|(i, stub)| Chapter {
                title: stub.title,
                index: i as u32 + 1,
                body: stub.content.unwrap_or_else(|| FETCH_FAILED.to_string()),
            })
            .collect();
        Book {
            title: title.into(),
            author: author.into(),
            language: language.into(),
            chapters,
            source_url,
        }
    }
}
