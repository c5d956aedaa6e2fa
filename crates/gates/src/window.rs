//! Sliding event window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A sliding window over event timestamps.
///
/// Timestamps are pushed in monotonic order and evicted eagerly from the
/// front on [`prune`](Self::prune), so memory stays bounded by the window
/// ceiling rather than growing with call volume.
#[derive(Debug, Default, Clone)]
pub struct SlidingWindow {
    hits: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop timestamps older than `window` before `now`.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.hits.front() {
            if now.duration_since(front) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record an event at `now`.
    pub fn record(&mut self, now: Instant) {
        self.hits.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    /// Oldest retained timestamp.
    pub fn oldest(&self) -> Option<Instant> {
        self.hits.front().copied()
    }

    /// Count events within the trailing `window` ending at `now`,
    /// without evicting anything (used for the nested burst window).
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.hits
            .iter()
            .rev()
            .take_while(|&&t| now.duration_since(t) < window)
            .count()
    }

    /// Oldest timestamp within the trailing `window` ending at `now`.
    pub fn oldest_within(&self, now: Instant, window: Duration) -> Option<Instant> {
        self.hits
            .iter()
            .find(|&&t| now.duration_since(t) < window)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_evicts_expired() {
        let start = Instant::now();
        let mut w = SlidingWindow::new();
        w.record(start);
        w.record(start + Duration::from_secs(30));

        let now = start + Duration::from_secs(61);
        w.prune(now, Duration::from_secs(60));
        assert_eq!(w.len(), 1);
        assert_eq!(w.oldest(), Some(start + Duration::from_secs(30)));
    }

    #[test]
    fn count_within_nested_window() {
        let start = Instant::now();
        let mut w = SlidingWindow::new();
        for i in 0..5 {
            w.record(start + Duration::from_secs(i * 10));
        }

        let now = start + Duration::from_secs(45);
        // Events at 40s and 30s fall inside a 20s trailing window.
        assert_eq!(w.count_within(now, Duration::from_secs(20)), 2);
        assert_eq!(
            w.oldest_within(now, Duration::from_secs(20)),
            Some(start + Duration::from_secs(30))
        );
    }

    #[test]
    fn boundary_is_exclusive_on_prune() {
        let start = Instant::now();
        let mut w = SlidingWindow::new();
        w.record(start);
        // A timestamp exactly one window old is evicted.
        w.prune(start + Duration::from_secs(60), Duration::from_secs(60));
        assert!(w.is_empty());
    }
}
