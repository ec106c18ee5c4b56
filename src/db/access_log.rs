//! Recording of table reads.
//!
//! A logger is passed to [`Store::get_tables`](crate::db::Store::get_tables);
//! while it is active every table read through it is remembered, so the
//! exact set of inputs of an analysis can later be saved with
//! [`Store::save_logged_tables`](crate::db::Store::save_logged_tables).

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LogState {
    active: bool,
    ids: Vec<String>,
}

/// Thread-safe list of accessed table IDs, in first-access order.
#[derive(Debug, Default)]
pub struct TableAccessLogger {
    state: Mutex<LogState>,
}

impl TableAccessLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.state.lock().active = true;
    }

    pub fn stop(&self) {
        self.state.lock().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Forget every recorded ID; the active flag is kept.
    pub fn clear(&self) {
        self.state.lock().ids.clear();
    }

    /// Remember `id` if the logger is active.
    pub fn record(&self, id: &str) {
        let mut state = self.state.lock();
        if state.active && !state.ids.iter().any(|seen| seen == id) {
            state.ids.push(id.to_string());
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.state.lock().ids.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_records_only_while_active() {
        let log = TableAccessLogger::new();
        log.record("A__B__C");
        assert!(log.snapshot().is_empty());

        log.start();
        log.record("A__B__C");
        log.record("D__E__F");
        log.record("A__B__C");
        log.stop();
        log.record("G__H__I");

        assert_eq!(log.snapshot(), vec!["A__B__C", "D__E__F"]);
        log.clear();
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_shared_between_threads() {
        let log = Arc::new(TableAccessLogger::new());
        log.start();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || log.record(&format!("T{}__P__S", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids = log.snapshot();
        ids.sort();
        assert_eq!(ids, vec!["T0__P__S", "T1__P__S", "T2__P__S", "T3__P__S"]);
    }
}
