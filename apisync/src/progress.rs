use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::isolation::Outcome;

/// Console progress for a run. Hidden when output is not wanted.
pub struct SyncProgress {
    bar: ProgressBar,
    applied: AtomicU64,
    failed: AtomicU64,
    start: Instant,
}

impl SyncProgress {
    pub fn new(verb: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {prefix} {pos} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_prefix(verb.to_string());
        Self::with_bar(bar)
    }

    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            applied: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    /// Announce the kind currently being processed.
    pub fn set_stage(&self, stage: &str) {
        self.bar.set_message(stage.to_string());
    }

    pub fn record(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied => {
                self.applied.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Skipped(_) => {}
        }
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        let applied = self.applied.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let elapsed = self.start.elapsed();

        self.bar.finish_with_message(format!(
            "done: {} applied in {:.1}s ({} failed)",
            applied,
            elapsed.as_secs_f64(),
            failed
        ));
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
