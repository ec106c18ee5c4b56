//! Progress reporting for network transfers (clone, push, pull).
//!
//! The core does not depend on progress for correctness; this only turns
//! libgit2's transfer callbacks into log lines at coarse intervals.

use git2::{FetchOptions, Progress, PushOptions, RemoteCallbacks};
use log::{debug, info};

/// Percentage step between two log lines.
const STEP: usize = 10;

/// Tracks one transfer and logs every [`STEP`] percent.
#[derive(Debug)]
pub struct TransferProgress {
    label: String,
    next_mark: usize,
}

impl TransferProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_mark: 0,
        }
    }

    /// Feed a `current / total` update; returns the percentage logged, if any.
    pub fn update(&mut self, current: usize, total: usize) -> Option<usize> {
        if total == 0 {
            return None;
        }
        let percent = current.saturating_mul(100) / total;
        if percent < self.next_mark {
            return None;
        }
        self.next_mark = (percent / STEP + 1) * STEP;
        if percent >= 100 {
            info!("{}: done ({} objects)", self.label, total);
        } else {
            debug!("{}: {}% ({}/{})", self.label, percent, current, total);
        }
        Some(percent)
    }

    fn on_fetch(&mut self, stats: &Progress<'_>) -> bool {
        self.update(stats.received_objects(), stats.total_objects());
        true
    }
}

/// Fetch options whose callbacks report into `progress`.
pub(crate) fn fetch_options(progress: &mut TransferProgress) -> FetchOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |stats| progress.on_fetch(&stats));
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

/// Push options whose callbacks report into `progress`.
pub(crate) fn push_options(progress: &mut TransferProgress) -> PushOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.push_transfer_progress(move |current, total, _bytes| {
        progress.update(current, total);
    });
    let mut options = PushOptions::new();
    options.remote_callbacks(callbacks);
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_at_coarse_steps() {
        let mut progress = TransferProgress::new("clone SRC");
        assert_eq!(progress.update(0, 200), Some(0));
        assert_eq!(progress.update(5, 200), None);
        assert_eq!(progress.update(21, 200), Some(10));
        assert_eq!(progress.update(22, 200), None);
        assert_eq!(progress.update(200, 200), Some(100));
    }

    #[test]
    fn test_unknown_total_is_silent() {
        let mut progress = TransferProgress::new("push SRC");
        assert_eq!(progress.update(3, 0), None);
    }
}
