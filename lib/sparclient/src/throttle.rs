//! Per-client query throttling.
//!
//! Each client (IP address, user name...) has an *intensity*: the sum of the durations of
//! its recent queries, in seconds, decaying linearly over time.
//! A client whose intensity is above the throttle threshold has its queries delayed, one
//! above the deny threshold has them refused.
//!
//! The state is kept in a shared [`KeyValueStore`] so that several processes can throttle
//! the same clients.

use crate::clock::{Clock, SystemClock};
use crate::error::{ExcessiveQueryError, StoreError, ThrottleError};
use crate::store::{KeyValueStore, StoreWrite};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Throttling settings.
///
/// ```
/// use sparclient::ThrottleConfig;
///
/// let config = ThrottleConfig::default().with_thresholds(5., 10.);
/// let trusted = ThrottleConfig::default().with_thresholds(30., 60.).allow_concurrent_queries();
/// let merged = config.merge_override(&trusted);
/// assert_eq!(merged.deny_threshold(), 60.);
/// assert!(merged.allows_concurrent_queries());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    throttle: bool,
    throttle_threshold: f64,
    deny_threshold: f64,
    intensity_decay: f64,
    allow_concurrent_queries: bool,
    lock_ttl: Duration,
    max_retries: usize,
    default_timeout: Option<Duration>,
    maximum_timeout: Option<Duration>,
    disable_timeout: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            throttle: true,
            throttle_threshold: 10.,
            deny_threshold: 20.,
            intensity_decay: 0.05,
            allow_concurrent_queries: false,
            lock_ttl: Duration::from_secs(30),
            max_retries: 64,
            default_timeout: None,
            maximum_timeout: None,
            disable_timeout: false,
        }
    }
}

impl ThrottleConfig {
    /// No throttling, no concurrency limit and no timeout cap, for trusted clients.
    pub fn unrestricted() -> Self {
        Self {
            throttle: false,
            allow_concurrent_queries: true,
            disable_timeout: true,
            ..Self::default()
        }
    }

    /// Enables or disables the intensity tracking.
    #[must_use]
    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the intensities from which queries are delayed and refused.
    #[must_use]
    pub fn with_thresholds(mut self, throttle_threshold: f64, deny_threshold: f64) -> Self {
        self.throttle_threshold = throttle_threshold;
        self.deny_threshold = deny_threshold;
        self
    }

    /// Sets how much intensity is lost per second.
    #[must_use]
    pub fn with_intensity_decay(mut self, intensity_decay: f64) -> Self {
        self.intensity_decay = intensity_decay;
        self
    }

    /// Lets a client run several queries at the same time.
    #[must_use]
    pub fn allow_concurrent_queries(mut self) -> Self {
        self.allow_concurrent_queries = true;
        self
    }

    /// Sets how long the lock of a client outlives a process that died while querying.
    #[must_use]
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// Bounds the number of attempts of each optimistic store update.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the timeout of the queries that don't ask for one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Caps the timeout a query may ask for.
    #[must_use]
    pub fn with_maximum_timeout(mut self, timeout: Duration) -> Self {
        self.maximum_timeout = Some(timeout);
        self
    }

    /// Lifts the cap set by [`with_maximum_timeout`](Self::with_maximum_timeout).
    #[must_use]
    pub fn without_timeout_cap(mut self) -> Self {
        self.disable_timeout = true;
        self
    }

    pub fn is_throttled(&self) -> bool {
        self.throttle
    }

    pub fn throttle_threshold(&self) -> f64 {
        self.throttle_threshold
    }

    pub fn deny_threshold(&self) -> f64 {
        self.deny_threshold
    }

    pub fn intensity_decay(&self) -> f64 {
        self.intensity_decay
    }

    pub fn allows_concurrent_queries(&self) -> bool {
        self.allow_concurrent_queries
    }

    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// The effective timeout cap, `None` if timeouts are not capped.
    pub fn maximum_timeout(&self) -> Option<Duration> {
        if self.disable_timeout {
            None
        } else {
            self.maximum_timeout
        }
    }

    /// The timeout to send with a query given the one the client asked for.
    ///
    /// A missing or zero request falls back to the default timeout. The result is capped
    /// to the maximum timeout.
    ///
    /// ```
    /// use sparclient::ThrottleConfig;
    /// use std::time::Duration;
    ///
    /// let config = ThrottleConfig::default()
    ///     .with_default_timeout(Duration::from_secs(10))
    ///     .with_maximum_timeout(Duration::from_secs(60));
    /// assert_eq!(config.timeout_for(None), Some(Duration::from_secs(10)));
    /// assert_eq!(config.timeout_for(Some(Duration::from_secs(600))), Some(Duration::from_secs(60)));
    /// ```
    pub fn timeout_for(&self, requested: Option<Duration>) -> Option<Duration> {
        let timeout = requested
            .filter(|timeout| !timeout.is_zero())
            .or(self.default_timeout)?;
        Some(match self.maximum_timeout() {
            Some(maximum) => timeout.min(maximum),
            None => timeout,
        })
    }

    /// Combines these settings with the privileges granted to a client,
    /// keeping the most permissive value of each setting.
    #[must_use]
    pub fn merge_override(&self, other: &Self) -> Self {
        Self {
            throttle: self.throttle && other.throttle,
            throttle_threshold: self.throttle_threshold.max(other.throttle_threshold),
            deny_threshold: self.deny_threshold.max(other.deny_threshold),
            intensity_decay: self.intensity_decay.max(other.intensity_decay),
            allow_concurrent_queries: self.allow_concurrent_queries
                || other.allow_concurrent_queries,
            lock_ttl: self.lock_ttl,
            max_retries: self.max_retries,
            default_timeout: self.default_timeout,
            maximum_timeout: match (self.maximum_timeout, other.maximum_timeout) {
                (Some(own), Some(granted)) => Some(own.max(granted)),
                (own, _) => own,
            },
            disable_timeout: self.disable_timeout || other.disable_timeout,
        }
    }
}

/// Applies a [`ThrottleConfig`] to the queries of each client.
///
/// ```
/// use sparclient::{MemoryStore, Throttle, ThrottleConfig, ThrottleError};
/// use std::sync::Arc;
///
/// let throttle = Throttle::new(Arc::new(MemoryStore::new()), ThrottleConfig::default());
/// let (answer, intensity) = throttle.run("192.0.2.1", || Ok::<_, std::io::Error>(42))?;
/// assert_eq!(answer, 42);
/// assert!(intensity.is_some_and(|i| i < 1.));
/// # Result::<_, ThrottleError<std::io::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct Throttle {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: ThrottleConfig,
}

impl Throttle {
    pub fn new(store: Arc<dyn KeyValueStore>, config: ThrottleConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// The current intensity of the client.
    pub fn intensity(&self, client_key: &str) -> Result<f64, StoreError> {
        let (intensity, last) = self.read_state(client_key)?;
        Ok(self.decay(intensity, last, self.clock.now()))
    }

    /// Runs `query` on behalf of the client.
    ///
    /// The query is refused if the client already has one in flight, unless concurrent
    /// queries are allowed, or if its intensity reached the deny threshold.
    /// It is delayed by `intensity - throttle_threshold` seconds if the intensity is above
    /// the throttle threshold.
    ///
    /// Returns the query output and the updated intensity of the client, if throttling is on.
    pub fn run<T, E>(
        &self,
        client_key: &str,
        query: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, Option<f64>), ThrottleError<E>> {
        let _lock = if self.config.allow_concurrent_queries {
            None
        } else {
            let Some(lock) = self.lock(client_key)? else {
                tracing::info!(client_key, "Refusing concurrent query");
                return Err(ThrottleError::ConcurrentQuery);
            };
            Some(lock)
        };
        if !self.config.throttle {
            return Ok((query().map_err(ThrottleError::Query)?, None));
        }

        let intensity = self.intensity(client_key)?;
        if intensity >= self.config.deny_threshold {
            let error = ExcessiveQueryError::new(
                intensity,
                self.config.deny_threshold,
                self.config.intensity_decay,
            );
            tracing::warn!(client_key, intensity, retry_after = ?error.retry_after(), "Refusing query");
            return Err(error.into());
        }
        if intensity > self.config.throttle_threshold {
            let delay = Duration::from_secs_f64(intensity - self.config.throttle_threshold);
            tracing::info!(client_key, intensity, ?delay, "Throttling query");
            self.clock.sleep(delay);
        }

        let started = self.clock.now();
        let result = query();
        let finished = self.clock.now();
        let duration = finished.saturating_sub(started);
        let new_intensity = match self.record(client_key, started, finished) {
            Ok(new_intensity) => new_intensity,
            Err(error) => {
                tracing::warn!(client_key, %error, "Failed to record the query intensity");
                intensity + duration.as_secs_f64()
            }
        };
        Ok((result.map_err(ThrottleError::Query)?, Some(new_intensity)))
    }

    /// Takes the query lock of the client, if it is free.
    fn lock(&self, client_key: &str) -> Result<Option<LockGuard>, StoreError> {
        let key = lock_key(client_key);
        let token = format!("{:016x}", rand::random::<u64>());
        if !self
            .store
            .set_if_absent(&key, &token, Some(self.config.lock_ttl))?
        {
            return Ok(None);
        }
        let (stop, stopped) = mpsc::channel::<()>();
        let store = Arc::clone(&self.store);
        let heartbeat_key = key.clone();
        let ttl = self.config.lock_ttl;
        let heartbeat = thread::Builder::new()
            .name("throttle-heartbeat".into())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(ttl / 3) {
                    match store.expire(&heartbeat_key, ttl) {
                        Ok(true) => (),
                        Ok(false) => {
                            tracing::warn!(key = %heartbeat_key, "Query lock lost");
                            break;
                        }
                        Err(error) => {
                            tracing::warn!(key = %heartbeat_key, %error, "Failed to renew the query lock");
                        }
                    }
                }
            })
            .inspect_err(|error| {
                tracing::warn!(%error, "Failed to start the query lock heartbeat");
            })
            .ok();
        Ok(Some(LockGuard {
            store: Arc::clone(&self.store),
            key,
            token,
            max_retries: self.config.max_retries,
            stop: Some(stop),
            heartbeat,
        }))
    }

    fn read_state(&self, client_key: &str) -> Result<(f64, f64), StoreError> {
        let intensity_key = intensity_key(client_key);
        let last_key = last_key(client_key);
        with_retries(self.config.max_retries, "intensity read", || {
            Ok(Some((
                read_float(&*self.store, &intensity_key)?,
                read_float(&*self.store, &last_key)?,
            )))
        })
    }

    /// Adds a query run between `started` and `finished` to the intensity of the client.
    fn record(
        &self,
        client_key: &str,
        started: Duration,
        finished: Duration,
    ) -> Result<f64, StoreError> {
        let intensity_key = intensity_key(client_key);
        let last_key = last_key(client_key);
        let duration = finished.saturating_sub(started).as_secs_f64();
        with_retries(self.config.max_retries, "intensity update", || {
            let watch = self.store.watch(&[intensity_key.as_str(), last_key.as_str()])?;
            let intensity = read_float(&*self.store, &intensity_key)?;
            let last = read_float(&*self.store, &last_key)?;
            let new_intensity = self.decay(intensity, last, started) + duration;
            let last = last.max(finished.as_secs_f64());
            let committed = self.store.commit(
                watch,
                &[
                    StoreWrite::set(&intensity_key, new_intensity),
                    StoreWrite::set(&last_key, last),
                ],
            )?;
            Ok(committed.then_some(new_intensity))
        })
    }

    fn decay(&self, intensity: f64, last: f64, now: Duration) -> f64 {
        let elapsed = (now.as_secs_f64() - last).max(0.);
        (intensity - elapsed * self.config.intensity_decay).max(0.)
    }
}

fn lock_key(client_key: &str) -> String {
    format!("sparql:lock:{client_key}")
}

fn intensity_key(client_key: &str) -> String {
    format!("sparql:intensity:{client_key}")
}

fn last_key(client_key: &str) -> String {
    format!("sparql:last:{client_key}")
}

fn read_float(store: &dyn KeyValueStore, key: &str) -> Result<f64, StoreError> {
    store.get(key)?.map_or(Ok(0.), |value| {
        value
            .parse()
            .map_err(|_| StoreError::new(format!("{key} is not a number: {value:?}")))
    })
}

/// Calls `attempt` until it returns `Some`, at most `max_retries` times.
fn with_retries<T>(
    max_retries: usize,
    operation: &str,
    mut attempt: impl FnMut() -> Result<Option<T>, StoreError>,
) -> Result<T, StoreError> {
    let mut last_error = None;
    for retry in 0..max_retries.max(1) {
        match attempt() {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => tracing::debug!(operation, retry, "Conflicting store update, retrying"),
            Err(error) => {
                tracing::debug!(operation, retry, %error, "Store failure, retrying");
                last_error = Some(error);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| StoreError::new(format!("too many conflicts during {operation}"))))
}

/// Holds the query lock of a client, renewing it until dropped.
struct LockGuard {
    store: Arc<dyn KeyValueStore>,
    key: String,
    token: String,
    max_retries: usize,
    stop: Option<Sender<()>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl LockGuard {
    /// Deletes the lock if it is still ours.
    fn release(&self) -> Result<bool, StoreError> {
        with_retries(self.max_retries, "lock release", || {
            let watch = self.store.watch(&[self.key.as_str()])?;
            if self.store.get(&self.key)?.as_deref() != Some(self.token.as_str()) {
                return Ok(Some(false));
            }
            Ok(self
                .store
                .commit(watch, &[StoreWrite::delete(&self.key)])?
                .then_some(true))
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(heartbeat) = self.heartbeat.take() {
            if heartbeat.join().is_err() {
                tracing::warn!(key = %self.key, "The query lock heartbeat panicked");
            }
        }
        match self.release() {
            Ok(true) => (),
            Ok(false) => tracing::debug!(key = %self.key, "The query lock expired before release"),
            Err(error) => tracing::warn!(key = %self.key, %error, "Failed to release the query lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::io;

    fn throttle(config: ThrottleConfig) -> (Throttle, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000_000)));
        let store = MemoryStore::with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        (
            Throttle::new(Arc::new(store), config).with_clock(Arc::clone(&clock) as Arc<dyn Clock>),
            clock,
        )
    }

    #[test]
    fn decay_is_linear_and_floored() {
        let (throttle, _) = throttle(ThrottleConfig::default().with_intensity_decay(0.5));
        assert_eq!(throttle.decay(10., 100., Duration::from_secs(104)), 8.);
        assert_eq!(throttle.decay(10., 100., Duration::from_secs(200)), 0.);
        assert_eq!(throttle.decay(10., 100., Duration::from_secs(90)), 10.);
    }

    #[test]
    fn unthrottled_queries_report_no_intensity() -> Result<(), ThrottleError<io::Error>> {
        let (throttle, _) = throttle(ThrottleConfig::unrestricted());
        assert_eq!(throttle.run("a", || Ok::<_, io::Error>(1))?, (1, None));
        Ok(())
    }
}
