//! Fixed-size worker pool that fills chapter stubs in parallel.
//!
//! Workers claim stub indices from a shared cursor and send `(index, result)` back to the
//! calling thread, which writes each result into the slot it came from. Completion order
//! never affects output order. The call returns only after every worker has finished.

use crate::model::{ChapterStub, FETCH_FAILED};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error};

pub const DEFAULT_WORKERS: usize = 5;

/// Parallel dispatcher with a fixed worker count.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    workers: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Dispatcher {
    /// Dispatcher with `workers` threads (at least 1).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `fetch` once per stub URL and store the returned text in that stub's `content`.
    ///
    /// `progress` is called on the calling thread after each completion with
    /// `(populated, total)`. A `fetch` that panics leaves its siblings running; its stub
    /// gets [FETCH_FAILED].
    pub fn populate<F>(
        &self,
        mut stubs: Vec<ChapterStub>,
        fetch: F,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Vec<ChapterStub>
    where
        F: Fn(&str) -> String + Sync,
    {
        let total = stubs.len();
        if total == 0 {
            return stubs;
        }
        let workers = self.workers.min(total);
        let urls: Vec<String> = stubs.iter().map(|s| s.source_url.clone()).collect();
        let cursor = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, Result<String, String>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let urls = &urls;
                let cursor = &cursor;
                let fetch = &fetch;
                scope.spawn(move || loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(url) = urls.get(index) else {
                        break;
                    };
                    let result = panic::catch_unwind(AssertUnwindSafe(|| fetch(url)))
                        .map_err(panic_message);
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
            // Receiver ends once every worker's sender is dropped.
            drop(tx);

            for (index, result) in rx {
                let stub = &mut stubs[index];
                let content = match result {
                    Ok(text) => text,
                    Err(reason) => {
                        error!(
                            chapter = %stub.title,
                            url = %stub.source_url,
                            "chapter download failed: {}",
                            reason
                        );
                        FETCH_FAILED.to_string()
                    }
                };
                debug!(index, chapter = %stub.title, "chapter done");
                stub.content = Some(content);
                if let Some(report) = progress {
                    let done = stubs.iter().filter(|s| s.is_populated()).count();
                    report(done, total);
                }
            }
        });

        stubs
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
