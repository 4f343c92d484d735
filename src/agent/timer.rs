use crossbeam_utils::atomic::AtomicCell;
use std::time::{Duration, Instant};

/// Deadline requested by curl through the multi handle's timer callback.
#[derive(Debug)]
pub(crate) struct Timer {
    deadline: AtomicCell<Option<Instant>>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self {
            deadline: AtomicCell::new(None),
        }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.deadline
            .load()
            .map(|deadline| now >= deadline)
            .unwrap_or(false)
    }

    pub(crate) fn get_remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .load()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub(crate) fn start(&self, timeout: Duration) {
        self.deadline.store(Some(Instant::now() + timeout));
    }

    pub(crate) fn stop(&self) {
        self.deadline.store(None);
    }
}
