//! Chapter content fetcher: one URL in, text out. Failures become placeholder text, never errors.

use crate::model::FetchOutcome;
use crate::scraper::error::FetchError;
use crate::scraper::retry::{RetryPolicy, RetryResult};
use crate::scraper::{PageKind, PageSource, SiteMarkup};
use tracing::{error, warn};

/// Sink for per-attempt fetch failures.
pub trait FetchObserver: Sync {
    /// Attempt number `attempt` (1-based) for `url` failed.
    fn attempt_failed(&self, url: &str, attempt: u32, error: &FetchError);

    /// All `attempts` failed; the chapter gets the repeated-failure text.
    fn gave_up(&self, url: &str, attempts: u32);
}

/// Observer that reports to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl FetchObserver for LogObserver {
    fn attempt_failed(&self, url: &str, attempt: u32, error: &FetchError) {
        warn!(url, attempt, "chapter fetch failed: {}", error);
    }

    fn gave_up(&self, url: &str, attempts: u32) {
        error!(url, attempts, "giving up on chapter after {} attempts", attempts);
    }
}

/// Fetches one chapter page, extracts its text, and retries the whole attempt on failure.
pub struct ContentFetcher<'a> {
    source: &'a dyn PageSource,
    markup: &'a dyn SiteMarkup,
    policy: RetryPolicy,
    observer: &'a dyn FetchObserver,
}

impl<'a> ContentFetcher<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        markup: &'a dyn SiteMarkup,
        policy: RetryPolicy,
        observer: &'a dyn FetchObserver,
    ) -> Self {
        Self {
            source,
            markup,
            policy,
            observer,
        }
    }

    /// Fetch `url` and classify the result. A missing content container is returned on the
    /// first attempt without retrying.
    pub fn fetch_outcome(&self, url: &str) -> FetchOutcome {
        let result = self.policy.run(
            |_| {
                self.source
                    .fetch_page(url, PageKind::Chapter)
                    .map(|html| self.markup.locate_content(&html))
            },
            |attempt, e| self.observer.attempt_failed(url, attempt, e),
        );
        match result {
            RetryResult::Done(Some(text)) => FetchOutcome::Content(text),
            RetryResult::Done(None) => FetchOutcome::Missing,
            RetryResult::Exhausted { attempts, .. } => {
                self.observer.gave_up(url, attempts);
                FetchOutcome::Exhausted { attempts }
            }
            RetryResult::Terminal { error, .. } => FetchOutcome::Failed(error.to_string()),
        }
    }

    /// Chapter text or placeholder text. Never fails.
    pub fn fetch(&self, url: &str) -> String {
        self.fetch_outcome(url).into_text()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{CONTENT_UNAVAILABLE, FETCH_FAILED, REPEATED_FAILURE};
    use crate::scraper::markup::SelectorMarkup;
    use crate::scraper::HttpSource;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Page source serving fixed HTML per URL; URLs in `failing` always time out first
    /// `fail_times` times (u32::MAX = forever).
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub pages: HashMap<String, String>,
        pub fail_times: HashMap<String, u32>,
        pub calls: Mutex<Vec<(String, PageKind)>>,
        counts: Mutex<HashMap<String, u32>>,
    }

    impl FakeSource {
        pub fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        pub fn failing(mut self, url: &str, times: u32) -> Self {
            self.fail_times.insert(url.to_string(), times);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    impl PageSource for FakeSource {
        fn fetch_page(&self, url: &str, kind: PageKind) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push((url.to_string(), kind));
            let mut counts = self.counts.lock().unwrap();
            let n = counts.entry(url.to_string()).or_insert(0);
            *n += 1;
            if let Some(&limit) = self.fail_times.get(url) {
                if *n <= limit {
                    return Err(FetchError::Timeout {
                        url: url.to_string(),
                    });
                }
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub failures: Mutex<Vec<(String, u32)>>,
        pub gave_up: AtomicU32,
    }

    impl FetchObserver for RecordingObserver {
        fn attempt_failed(&self, url: &str, attempt: u32, _error: &FetchError) {
            self.failures
                .lock()
                .unwrap()
                .push((url.to_string(), attempt));
        }

        fn gave_up(&self, _url: &str, _attempts: u32) {
            self.gave_up.fetch_add(1, Ordering::SeqCst);
        }
    }

    const URL: &str = "https://site/c/1";

    #[test]
    fn content_is_extracted() {
        let source = FakeSource::default().page(URL, r#"<div id="txt">正文<br>第二行</div>"#);
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::new(3), &observer);
        assert_eq!(fetcher.fetch(URL), "正文\n第二行");
        assert!(observer.failures.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_container_yields_unavailable_without_retry() {
        let source = FakeSource::default().page(URL, r#"<div id="other">x</div>"#);
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::new(100), &observer);
        assert_eq!(fetcher.fetch_outcome(URL), FetchOutcome::Missing);
        assert_eq!(fetcher.fetch(URL), CONTENT_UNAVAILABLE);
        assert_eq!(source.call_count(), 2);
        assert!(observer.failures.lock().unwrap().is_empty());
    }

    #[test]
    fn exhausted_fetch_yields_repeated_failure_with_one_report_per_attempt() {
        let source = FakeSource::default().failing(URL, u32::MAX);
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::default(), &observer);
        assert_eq!(fetcher.fetch(URL), REPEATED_FAILURE);
        let failures = observer.failures.lock().unwrap();
        assert_eq!(failures.len(), 100);
        assert_eq!(failures.first().map(|f| f.1), Some(1));
        assert_eq!(failures.last().map(|f| f.1), Some(100));
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 1);
        assert_eq!(source.call_count(), 100);
    }

    #[test]
    fn recovers_after_transient_failures() {
        let source = FakeSource::default()
            .page(URL, r#"<div id="txt">终于</div>"#)
            .failing(URL, 2);
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::new(5), &observer);
        assert_eq!(
            fetcher.fetch_outcome(URL),
            FetchOutcome::Content("终于".into())
        );
        assert_eq!(observer.failures.lock().unwrap().len(), 2);
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn terminal_error_yields_generic_failure_after_one_attempt() {
        // No page registered: the fake answers 404, which the transient-only classifier stops on.
        let source = FakeSource::default();
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let policy = RetryPolicy::new(100).with_classifier(FetchError::is_transient);
        let fetcher = ContentFetcher::new(&source, &markup, policy, &observer);
        assert!(matches!(
            fetcher.fetch_outcome(URL),
            FetchOutcome::Failed(_)
        ));
        assert_eq!(fetcher.fetch(URL), FETCH_FAILED);
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn malformed_url_is_retried_to_the_cap() -> Result<(), reqwest::Error> {
        let source = HttpSource::new()?;
        let markup = SelectorMarkup::with_defaults().unwrap();
        let observer = RecordingObserver::default();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::default(), &observer);
        assert_eq!(
            fetcher.fetch_outcome("not a url"),
            FetchOutcome::Exhausted { attempts: 100 }
        );
        assert_eq!(observer.failures.lock().unwrap().len(), 100);
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.fetch("not a url"), REPEATED_FAILURE);
        Ok(())
    }

    #[test]
    fn chapter_requests_are_marked_as_chapter_pages() {
        let source = FakeSource::default().page(URL, r#"<div id="txt">x</div>"#);
        let markup = SelectorMarkup::with_defaults().unwrap();
        let fetcher = ContentFetcher::new(&source, &markup, RetryPolicy::new(1), &LogObserver);
        fetcher.fetch(URL);
        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), [(URL.to_string(), PageKind::Chapter)]);
    }
}
