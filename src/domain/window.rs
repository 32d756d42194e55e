//! Sliding request window for a single client.
//!
//! A window is the ascending list of Unix-second timestamps at which a client
//! was admitted, restricted to the trailing timeframe. It is the value stored
//! per client by every rate-limit storage backend and serializes as a plain
//! JSON array of integers.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Decision made by a request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// The request fits in the window and was recorded
    Admit,
    /// The window is full; nothing was recorded
    Reject,
}

impl WindowDecision {
    /// Check if this decision is Admit.
    pub fn is_admit(&self) -> bool {
        matches!(self, WindowDecision::Admit)
    }

    /// Check if this decision is Reject.
    pub fn is_reject(&self) -> bool {
        matches!(self, WindowDecision::Reject)
    }
}

/// Timestamps of admitted requests within the trailing window.
///
/// # Example
/// ```
/// use license_gate::RequestWindow;
///
/// let mut window = RequestWindow::new();
/// let now = 1_700_000_000;
///
/// // Two requests per 60 seconds
/// assert!(window.admit(now, 2, 60).is_admit());
/// assert!(window.admit(now + 1, 2, 60).is_admit());
/// assert!(window.admit(now + 2, 2, 60).is_reject());
///
/// // The first timestamp leaves the window after 60 seconds
/// assert!(window.admit(now + 60, 2, 60).is_admit());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestWindow {
    timestamps: VecDeque<i64>,
}

impl RequestWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from previously persisted timestamps.
    pub fn from_timestamps(timestamps: impl IntoIterator<Item = i64>) -> Self {
        let mut timestamps: VecDeque<i64> = timestamps.into_iter().collect();
        timestamps.make_contiguous().sort_unstable();
        Self { timestamps }
    }

    /// Drop every timestamp with `now - ts >= timeframe_secs`.
    ///
    /// Persisted state may come from another process with a skewed clock,
    /// so this filters the whole sequence instead of only the front.
    pub fn prune(&mut self, now: i64, timeframe_secs: u64) {
        let timeframe = i64::try_from(timeframe_secs).unwrap_or(i64::MAX);
        self.timestamps
            .retain(|&ts| now.saturating_sub(ts) < timeframe);
    }

    /// Prune, then record `now` if fewer than `max_requests` remain.
    ///
    /// A rejected request is not recorded, so a client hammering a full
    /// window does not extend its own lockout.
    pub fn admit(&mut self, now: i64, max_requests: u32, timeframe_secs: u64) -> WindowDecision {
        self.prune(now, timeframe_secs);

        if self.timestamps.len() >= max_requests as usize {
            WindowDecision::Reject
        } else {
            self.timestamps.push_back(now);
            WindowDecision::Admit
        }
    }

    /// Number of timestamps currently held (not pruned).
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no timestamps.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Iterate over the held timestamps, oldest first.
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.timestamps.iter().copied()
    }
}
