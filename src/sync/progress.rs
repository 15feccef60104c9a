use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cooperative cancellation flag, polled at folder/file granularity by
/// both sync phases. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress reporting seam, decoupled from any particular UI.
pub trait ProgressSink: Send + Sync {
    /// Start a phase. `total == 0` means the amount of work is unknown
    /// (analysis); a positive total enables completed/total reporting.
    fn begin(&self, total: usize);

    /// One unit of work done (or, with unknown total, a status update).
    fn advance(&self, message: &str);

    fn finish(&self, message: &str);
}

/// Sink for quiet mode and tests.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn begin(&self, _total: usize) {}
    fn advance(&self, _message: &str) {}
    fn finish(&self, _message: &str) {}
}

/// Terminal progress bar. One bar instance per phase; `begin` swaps in
/// a spinner for unknown totals and a position bar otherwise.
pub struct TerminalProgress {
    bar: Mutex<ProgressBar>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(ProgressBar::hidden()),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn begin(&self, total: usize) {
        let next = if total == 0 {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            bar
        };

        let mut bar = self.bar.lock().unwrap();
        bar.finish_and_clear();
        *bar = next;
    }

    fn advance(&self, message: &str) {
        let bar = self.bar.lock().unwrap();
        bar.set_message(message.to_string());
        if bar.length().unwrap_or(0) > 0 {
            bar.inc(1);
        }
    }

    fn finish(&self, message: &str) {
        self.bar.lock().unwrap().finish_with_message(message.to_string());
    }
}
