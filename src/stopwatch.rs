use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::time::{Duration, Instant};

/// Elapsed-time accumulator with explicit pause/resume, the way a
/// profiler's per-component timer works: call `resume` before doing
/// the work, `pause` after, and `elapsed()` reports the sum across
/// every run interval so far.
#[derive(Debug, Clone, Copy)]
enum State {
    Paused,
    Running(Instant),
}

#[derive(Debug, Clone)]
pub struct StopWatch {
    state: State,
    accumulated: Duration,
}

impl Default for StopWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl StopWatch {
    pub fn new() -> Self {
        Self {
            state: State::Paused,
            accumulated: Duration::ZERO,
        }
    }

    /// Starts (or resumes) timing. Calling this while already
    /// running is a no-op other than a logged warning.
    pub fn resume(&mut self) {
        match self.state {
            State::Running(_) => {
                tracing::warn!("StopWatch::resume called while already running");
            }
            State::Paused => {
                self.state = State::Running(Instant::now());
            }
        }
    }

    /// Stops timing and folds the just-finished interval into the
    /// accumulator. Calling this while already paused is a no-op
    /// other than a logged warning.
    pub fn pause(&mut self) {
        match self.state {
            State::Paused => {
                tracing::warn!("StopWatch::pause called while already paused");
            }
            State::Running(started) => {
                self.accumulated += started.elapsed();
                self.state = State::Paused;
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Paused;
        self.accumulated = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Total elapsed duration across every run interval, including
    /// the one currently in progress if running.
    pub fn elapsed(&self) -> Duration {
        match self.state {
            State::Paused => self.accumulated,
            State::Running(started) => self.accumulated + started.elapsed(),
        }
    }
}

impl Add for StopWatch {
    type Output = StopWatch;
    fn add(self, rhs: StopWatch) -> StopWatch {
        StopWatch {
            state: State::Paused,
            accumulated: self.elapsed() + rhs.elapsed(),
        }
    }
}

impl Sub for StopWatch {
    type Output = StopWatch;
    fn sub(self, rhs: StopWatch) -> StopWatch {
        StopWatch {
            state: State::Paused,
            accumulated: self.elapsed().saturating_sub(rhs.elapsed()),
        }
    }
}

impl Mul<f64> for StopWatch {
    type Output = StopWatch;
    fn mul(self, rhs: f64) -> StopWatch {
        StopWatch {
            state: State::Paused,
            accumulated: self.elapsed().mul_f64(rhs),
        }
    }
}

impl Div<f64> for StopWatch {
    type Output = StopWatch;
    fn div(self, rhs: f64) -> StopWatch {
        StopWatch {
            state: State::Paused,
            accumulated: self.elapsed().div_f64(rhs),
        }
    }
}

/// Dimensionless ratio of two accumulated durations, for reporting
/// what share of a frame one component's StopWatch consumed.
impl Div<StopWatch> for StopWatch {
    type Output = f64;
    fn div(self, rhs: StopWatch) -> f64 {
        self.elapsed().as_secs_f64() / rhs.elapsed().as_secs_f64()
    }
}

impl fmt::Display for StopWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed().as_secs_f64();
        if secs < 1e-3 {
            write!(f, "{:.3}us", secs * 1e6)
        } else if secs < 1.0 {
            write!(f, "{:.3}ms", secs * 1e3)
        } else if secs < 60.0 {
            write!(f, "{:.3}s", secs)
        } else if secs < 3600.0 {
            let m = (secs / 60.0) as u64;
            let s = secs - (m as f64) * 60.0;
            write!(f, "{m}m{s:.3}s")
        } else if secs < 86400.0 {
            let h = (secs / 3600.0) as u64;
            let m = ((secs - (h as f64) * 3600.0) / 60.0) as u64;
            let s = secs - (h as f64) * 3600.0 - (m as f64) * 60.0;
            write!(f, "{h}h{m}m{s:.3}s")
        } else {
            let d = (secs / 86400.0) as u64;
            let h = ((secs - (d as f64) * 86400.0) / 3600.0) as u64;
            let m = ((secs - (d as f64) * 86400.0 - (h as f64) * 3600.0) / 60.0) as u64;
            write!(f, "{d}d{h}h{m}m")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn elapsed_accumulates_across_runs() {
        let mut sw = StopWatch::new();
        sw.resume();
        sleep(Duration::from_millis(5));
        sw.pause();
        let first = sw.elapsed();
        sw.resume();
        sleep(Duration::from_millis(5));
        sw.pause();
        assert!(sw.elapsed() > first);
    }

    #[test]
    fn resume_while_running_is_idempotent() {
        let mut sw = StopWatch::new();
        sw.resume();
        sw.resume();
        assert!(sw.is_running());
    }

    #[test]
    fn pause_while_paused_is_idempotent() {
        let mut sw = StopWatch::new();
        sw.pause();
        assert!(!sw.is_running());
        assert_eq!(sw.elapsed(), Duration::ZERO);
    }

    #[test]
    fn addition_sums_elapsed_durations() {
        let mut a = StopWatch::new();
        a.resume();
        sleep(Duration::from_millis(2));
        a.pause();

        let mut b = StopWatch::new();
        b.resume();
        sleep(Duration::from_millis(2));
        b.pause();

        let sum = a.clone() + b.clone();
        assert!(sum.elapsed() >= a.elapsed() + b.elapsed() - Duration::from_micros(100));
    }

    #[test]
    fn display_scales_to_milliseconds() {
        let mut sw = StopWatch::new();
        sw.resume();
        sleep(Duration::from_millis(5));
        sw.pause();
        let text = sw.to_string();
        assert!(text.ends_with("ms"));
    }
}
