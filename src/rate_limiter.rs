use std::time::{Duration, Instant};

/// Gates a callback so it runs no more often than `min_interval`.
/// Not thread-safe; each owner holds its own instance.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Runs `f` and returns its result if enough time has passed
    /// since the last successful call, otherwise returns `None`
    /// without invoking `f`.
    pub fn try_call<T>(&mut self, f: impl FnOnce() -> T) -> Option<T> {
        let now = Instant::now();
        let due = match self.last_call {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_call = Some(now);
        Some(f())
    }
}
