//! Log output setup. `RUST_LOG` wins when set; otherwise the level follows --quiet / --verbose.
//!
//! Log lines go to stderr. While a progress bar is attached they are written through
//! [ProgressBar::suspend] so the bar is cleared and redrawn around each line.

use indicatif::ProgressBar;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

static ACTIVE_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

/// Default filter directive for the given verbosity flags.
pub fn default_filter(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "novelscrape=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber, writing compact lines to stderr.
pub fn init(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(quiet, verbose)));
    // Fails only if a subscriber is already installed; the first one stays.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| BarAwareStderr)
        .with_target(false)
        .without_time()
        .compact()
        .try_init()
        .ok();
}

/// Report panics as log events instead of raw stderr output, so a worker panic the
/// dispatcher absorbs does not draw over the progress bar.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {}", info);
    }));
}

/// Route log output around `bar` until [detach_progress] is called.
pub fn attach_progress(bar: &ProgressBar) {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = Some(bar.clone());
    }
}

pub fn detach_progress() {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = None;
    }
}

fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.lock().ok().and_then(|active| active.clone())
}

/// Stderr writer that suspends the attached progress bar for each write.
struct BarAwareStderr;

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match active_bar() {
            Some(bar) => bar.suspend(|| io::stderr().write_all(buf))?,
            None => io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
