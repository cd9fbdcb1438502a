//! Debouncing of save events.
//!
//! Editors often write a file several times per save (atomic rename,
//! format-on-save). Each path is compiled once it has been quiet for the
//! configured duration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces file change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last change timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a file must be stable before processing.
    duration: Duration,
}

impl Debouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record a change. Resets the timer for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Take all paths that have been stable for the debounce duration,
    /// oldest change first.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push((*last_change, path.clone()));
                false
            } else {
                true
            }
        });

        ready.sort();
        ready.into_iter().map(|(_, path)| path).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/proj/scss/site.scss");
        debouncer.record(path.clone());

        // Immediately after, nothing should be ready
        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.has_pending());

        sleep(Duration::from_millis(60));

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![path]);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_debouncer_resets_on_new_change() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/proj/scss/site.scss");
        debouncer.record(path.clone());
        sleep(Duration::from_millis(30));

        // Second write of the same save
        debouncer.record(path.clone());
        sleep(Duration::from_millis(30));

        // 60ms since the first write, only 30ms since the second
        assert!(debouncer.take_ready().is_empty());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[test]
    fn test_debouncer_multiple_files() {
        let mut debouncer = Debouncer::new(50);

        let first = PathBuf::from("/proj/scss/_vars.scss");
        let second = PathBuf::from("/proj/scss/site.scss");

        debouncer.record(first.clone());
        sleep(Duration::from_millis(30));
        debouncer.record(second.clone());
        sleep(Duration::from_millis(25));

        assert_eq!(debouncer.take_ready(), vec![first]);
        assert!(debouncer.has_pending());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready(), vec![second]);
    }

    #[test]
    fn test_debouncer_ready_in_change_order() {
        let mut debouncer = Debouncer::new(10);

        let a = PathBuf::from("/proj/b.scss");
        let b = PathBuf::from("/proj/a.scss");
        debouncer.record(a.clone());
        sleep(Duration::from_millis(2));
        debouncer.record(b.clone());
        sleep(Duration::from_millis(20));

        assert_eq!(debouncer.take_ready(), vec![a, b]);
    }

    #[test]
    fn test_debouncer_remove() {
        let mut debouncer = Debouncer::new(50);

        let path = PathBuf::from("/proj/scss/site.scss");
        debouncer.record(path.clone());
        assert!(debouncer.has_pending());

        debouncer.remove(&path);
        assert!(!debouncer.has_pending());
    }
}
