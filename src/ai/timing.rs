//! Execution Timer
//!
//! Wall-clock start time for records, monotonic clock for durations.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Measures one execution from start to stop
#[derive(Debug, Clone)]
pub struct Timer {
    name: String,
    started_at: DateTime<Utc>,
    start: Instant,
    elapsed: Option<Duration>,
}

impl Timer {
    /// Start timing immediately
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: Utc::now(),
            start: Instant::now(),
            elapsed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wall-clock start time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop the timer. The first call fixes the duration; later calls return it unchanged.
    pub fn stop(&mut self) -> Duration {
        *self.elapsed.get_or_insert_with(|| self.start.elapsed())
    }

    pub fn is_stopped(&self) -> bool {
        self.elapsed.is_some()
    }

    /// Fixed duration once stopped, running duration before that
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.start.elapsed())
    }

    pub fn duration_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}
