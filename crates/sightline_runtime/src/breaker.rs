//! Circuit breaker for full recomputations.
//!
//! A fixed window opens on the first call. Calls beyond the limit inside the
//! window are refused. The breaker resets itself once the window elapses.

use sightline_foundation::{Millis, RateLimit};

/// Caps how many full recomputations may run per window.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    limit: u32,
    window_ms: u64,
    window_start: Option<Millis>,
    count: u32,
    tripped: u64,
}

impl CircuitBreaker {
    /// Creates a breaker allowing `limit` calls per `window_ms`.
    #[must_use]
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self {
            limit,
            window_ms,
            window_start: None,
            count: 0,
            tripped: 0,
        }
    }

    /// Records one call at `now`.
    ///
    /// # Errors
    ///
    /// Returns the exceeded limit if the window is already full.
    pub fn try_acquire(&mut self, now: Millis) -> Result<(), RateLimit> {
        self.roll_window(now);
        if self.count >= self.limit {
            self.tripped += 1;
            tracing::warn!(
                limit = self.limit,
                window_ms = self.window_ms,
                "circuit breaker open, dropping full recompute"
            );
            return Err(RateLimit::CircuitBreaker {
                limit: self.limit,
                window_ms: self.window_ms,
            });
        }
        self.count += 1;
        Ok(())
    }

    /// Returns true if the next call at `now` would be refused.
    #[must_use]
    pub fn is_open(&self, now: Millis) -> bool {
        match self.window_end() {
            Some(end) if now < end => self.count >= self.limit,
            _ => false,
        }
    }

    /// When the current window closes, if one is open.
    #[must_use]
    pub fn window_end(&self) -> Option<Millis> {
        self.window_start.map(|start| start + self.window_ms)
    }

    /// Calls refused since creation.
    #[must_use]
    pub fn tripped_count(&self) -> u64 {
        self.tripped
    }

    /// Closes the window immediately.
    pub fn reset(&mut self) {
        self.window_start = None;
        self.count = 0;
    }

    fn roll_window(&mut self, now: Millis) {
        let expired = self.window_end().is_none_or(|end| now >= end);
        if expired {
            if self.count >= self.limit && self.window_start.is_some() {
                tracing::info!("circuit breaker window elapsed, resetting");
            }
            self.window_start = Some(now);
            self.count = 0;
        }
    }
}
