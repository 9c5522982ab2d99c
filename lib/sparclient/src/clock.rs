use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time, and a way to wait.
///
/// The throttle stores timestamps shared between processes, so times are
/// durations since the Unix epoch rather than [`Instant`](std::time::Instant)s.
pub trait Clock: Send + Sync {
    /// The current time, as a duration since the Unix epoch.
    fn now(&self) -> Duration;

    /// Blocks the current thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// A clock that only moves when told to.
///
/// [`sleep`](Clock::sleep) advances the clock instead of blocking.
///
/// ```
/// use sparclient::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(Duration::from_secs(100));
/// clock.sleep(Duration::from_secs(5));
/// assert_eq!(clock.now(), Duration::from_secs(105));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            micros: AtomicU64::new(to_micros(start)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.micros
            .fetch_add(to_micros(duration), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Relaxed))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

fn to_micros(duration: Duration) -> u64 {
    duration.as_micros().try_into().unwrap_or(u64::MAX)
}
