//! Injectable time source
//!
//! Cooldowns, check intervals and the nighttime predicate all read time
//! through [`Clock`] so tests can drive them deterministically.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, Timelike};
use parking_lot::Mutex;

/// Wall-clock capability.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;

    /// Local hour of day (0-23) at `now()`.
    fn local_hour(&self) -> u32 {
        let now = self.now();
        let secs = now.floor() as i64;
        DateTime::from_timestamp(secs, 0)
            .map(|utc| utc.with_timezone(&Local).hour())
            .unwrap_or(0)
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Reads the operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct ManualState {
    now: f64,
    hour: Option<u32>,
}

/// Settable clock for tests and offline replay.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start,
                hour: None,
            }),
        }
    }

    /// Shared handle, usable both as `SharedClock` and for driving time.
    pub fn shared(start: f64) -> Arc<Self> {
        Arc::new(Self::new(start))
    }

    pub fn set(&self, now: f64) {
        self.state.lock().now = now;
    }

    pub fn advance(&self, seconds: f64) {
        self.state.lock().now += seconds;
    }

    /// Pin the reported local hour; `None` derives it from `now()`.
    pub fn set_local_hour(&self, hour: Option<u32>) {
        self.state.lock().hour = hour.map(|h| h % 24);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.state.lock().now
    }

    fn local_hour(&self) -> u32 {
        let state = self.state.lock();
        match state.hour {
            Some(hour) => hour,
            None => DateTime::from_timestamp(state.now.floor() as i64, 0)
                .map(|utc| utc.with_timezone(&Local).hour())
                .unwrap_or(0),
        }
    }
}
