//! Common types used across the platform

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff member driving a change, as resolved by the authorization layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    /// Whether the caller's role permits the requested change
    pub authorized: bool,
}

impl Actor {
    pub fn new(id: Uuid, authorized: bool) -> Self {
        Self { id, authorized }
    }
}

/// Sliding-window admission: at most `max_hits` accepted hits in any
/// trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    pub window: Duration,
    pub max_hits: usize,
}

impl SlidingWindow {
    pub fn new(window: Duration, max_hits: usize) -> Self {
        Self { window, max_hits }
    }

    /// Earliest timestamp still inside the window at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Prune hits that have left the window, then accept and record `now`
    /// iff fewer than `max_hits` remain. `hits` is oldest-first.
    pub fn admit(&self, hits: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let cutoff = self.cutoff(now);
        while hits.front().is_some_and(|hit| *hit <= cutoff) {
            hits.pop_front();
        }
        if hits.len() >= self.max_hits {
            return false;
        }
        hits.push_back(now);
        true
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self {
            window: Duration::seconds(60),
            max_hits: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixth_hit_in_window_is_rejected() {
        let limiter = SlidingWindow::default();
        let start = Utc::now();
        let mut hits = VecDeque::new();

        for i in 0..5 {
            assert!(limiter.admit(&mut hits, start + Duration::seconds(i)));
        }
        assert!(!limiter.admit(&mut hits, start + Duration::seconds(30)));
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_hits_expire_after_window() {
        let limiter = SlidingWindow::default();
        let start = Utc::now();
        let mut hits = VecDeque::new();

        for _ in 0..5 {
            assert!(limiter.admit(&mut hits, start));
        }
        assert!(!limiter.admit(&mut hits, start + Duration::seconds(59)));
        assert!(limiter.admit(&mut hits, start + Duration::seconds(60)));
    }

    #[test]
    fn test_window_slides_hit_by_hit() {
        let limiter = SlidingWindow::new(Duration::seconds(10), 2);
        let start = Utc::now();
        let mut hits = VecDeque::new();

        assert!(limiter.admit(&mut hits, start));
        assert!(limiter.admit(&mut hits, start + Duration::seconds(5)));
        assert!(!limiter.admit(&mut hits, start + Duration::seconds(9)));
        // First hit leaves the window, second is still inside
        assert!(limiter.admit(&mut hits, start + Duration::seconds(10)));
        assert!(!limiter.admit(&mut hits, start + Duration::seconds(14)));
    }

    #[test]
    fn test_rejected_hits_are_not_recorded() {
        let limiter = SlidingWindow::new(Duration::seconds(60), 1);
        let start = Utc::now();
        let mut hits = VecDeque::new();

        assert!(limiter.admit(&mut hits, start));
        for i in 1..10 {
            assert!(!limiter.admit(&mut hits, start + Duration::seconds(i)));
        }
        assert_eq!(hits.len(), 1);
        assert!(limiter.admit(&mut hits, start + Duration::seconds(60)));
    }
}
