//! Status indicator reverts.
//!
//! After a trigger finishes, the indicator goes back to showing the watch
//! state. Success reverts at once; error paths keep the result visible for a
//! while first. Each revert takes a new generation, so a newer trigger
//! supersedes a revert that is still waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::host::{Host, OutputLevel, Report, Status};

/// Whether the controller reacts to saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    NotWatching,
}

impl WatchState {
    pub fn from_flag(watching: bool) -> Self {
        if watching {
            WatchState::Watching
        } else {
            WatchState::NotWatching
        }
    }

    pub fn is_watching(self) -> bool {
        self == WatchState::Watching
    }

    pub(crate) fn status(self) -> Status {
        match self {
            WatchState::Watching => Status::Watching,
            WatchState::NotWatching => Status::NotWatching,
        }
    }

    fn headline(self) -> &'static str {
        match self {
            WatchState::Watching => "Watching...",
            WatchState::NotWatching => "Not Watching...",
        }
    }
}

pub(crate) struct StatusReverter {
    host: Arc<dyn Host>,
    state: Arc<Mutex<WatchState>>,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl StatusReverter {
    pub(crate) fn new(host: Arc<dyn Host>, state: Arc<Mutex<WatchState>>) -> Self {
        Self {
            host,
            state,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    /// Show the watch state now, cancelling any pending revert.
    pub(crate) fn revert_now(&self) {
        self.supersede();
        show_state(self.host.as_ref(), *self.state.lock());
    }

    /// Show the watch state after `delay`, unless superseded first.
    pub(crate) fn revert_after(&self, delay: Duration) {
        let generation = self.supersede();
        let counter = Arc::clone(&self.generation);
        let host = Arc::clone(&self.host);
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if counter.load(Ordering::SeqCst) == generation {
                show_state(host.as_ref(), *state.lock());
            }
        });
        *self.pending.lock() = Some(handle);
    }

    /// Take a new generation and abort the pending revert.
    fn supersede(&self) -> u64 {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for StatusReverter {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

fn show_state(host: &dyn Host, state: WatchState) {
    host.show_status(state.status());
    host.show_report(Report::new(OutputLevel::Information, state.headline()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn reverter(state: WatchState) -> (Arc<MemoryHost>, StatusReverter) {
        let host = Arc::new(MemoryHost::new());
        let reverter = StatusReverter::new(host.clone(), Arc::new(Mutex::new(state)));
        (host, reverter)
    }

    #[tokio::test]
    async fn test_revert_now_shows_state() {
        let (host, reverter) = reverter(WatchState::Watching);
        reverter.revert_now();
        assert_eq!(host.last_status(), Some(Status::Watching));
        assert_eq!(host.reports_titled("Watching...").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_revert_fires_after_delay() {
        let (host, reverter) = reverter(WatchState::NotWatching);
        reverter.revert_after(Duration::from_millis(3000));

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(host.statuses().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(host.last_status(), Some(Status::NotWatching));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_revert_supersedes_pending_one() {
        let (host, reverter) = reverter(WatchState::Watching);
        reverter.revert_after(Duration::from_millis(100));
        reverter.revert_after(Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(host.statuses().is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(host.statuses(), vec![Status::Watching]);
    }
}
