use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A shared key-value store, such as Redis, holding the throttle state.
///
/// Besides plain reads and writes, it supports optimistic transactions:
/// [`watch`](Self::watch) snapshots the versions of some keys and
/// [`commit`](Self::commit) applies writes only if none of them changed since.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Sets the key only if it does not exist yet, with an optional time to live.
    ///
    /// Returns `true` if the key has been set.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Sets the time to live of an existing key.
    ///
    /// Returns `false` if the key does not exist.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Returns `true` if the key existed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Starts an optimistic transaction over the given keys.
    fn watch(&self, keys: &[&str]) -> Result<Watch, StoreError>;

    /// Applies the writes atomically if none of the watched keys changed.
    ///
    /// Returns `false`, writing nothing, on conflict.
    fn commit(&self, watch: Watch, writes: &[StoreWrite]) -> Result<bool, StoreError>;
}

/// The versions of a set of keys at the time of a [`KeyValueStore::watch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    versions: Vec<(String, u64)>,
}

impl Watch {
    pub fn new(versions: Vec<(String, u64)>) -> Self {
        Self { versions }
    }

    pub fn versions(&self) -> &[(String, u64)] {
        &self.versions
    }
}

/// A write applied by [`KeyValueStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Set { key: String, value: String },
    Delete { key: String },
}

impl StoreWrite {
    pub fn set(key: impl Into<String>, value: impl ToString) -> Self {
        Self::Set {
            key: key.into(),
            value: value.to_string(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }
}

/// An in-process [`KeyValueStore`].
///
/// Useful when all the throttled clients are served by the same process, and in tests.
///
/// ```
/// use sparclient::{KeyValueStore, MemoryStore, StoreWrite};
///
/// let store = MemoryStore::new();
/// let watch = store.watch(&["counter"])?;
/// store.set("counter", "1")?;
/// assert!(!store.commit(watch, &[StoreWrite::set("counter", 2)])?);
/// assert_eq!(store.get("counter")?.as_deref(), Some("1"));
/// # Result::<_, sparclient::StoreError>::Ok(())
/// ```
pub struct MemoryStore {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Entries {
    values: HashMap<String, Entry>,
    last_version: u64,
}

struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Duration>,
}

impl Entries {
    fn live(&self, key: &str, now: Duration) -> Option<&Entry> {
        self.values
            .get(key)
            .filter(|entry| entry.expires_at.is_none_or(|t| t > now))
    }

    fn insert(&mut self, key: &str, value: &str, expires_at: Option<Duration>) {
        self.last_version += 1;
        self.values.insert(
            key.into(),
            Entry {
                value: value.into(),
                version: self.last_version,
                expires_at,
            },
        );
    }

    fn version(&self, key: &str, now: Duration) -> u64 {
        self.live(key, now).map_or(0, |entry| entry.version)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// A store whose time to live expirations follow the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::default(),
            clock,
        }
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut Entries, Duration) -> T,
    ) -> Result<T, StoreError> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::new("Mutex poisoned"))?;
        Ok(f(&mut entries, now))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|entries, now| entries.live(key, now).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_entries(|entries, _| entries.insert(key, value, None))
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.with_entries(|entries, now| {
            if entries.live(key, now).is_some() {
                return false;
            }
            entries.insert(key, value, ttl.map(|ttl| now + ttl));
            true
        })
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.with_entries(|entries, now| {
            if entries.live(key, now).is_none() {
                return false;
            }
            if let Some(entry) = entries.values.get_mut(key) {
                entry.expires_at = Some(now + ttl);
            }
            true
        })
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries, now| {
            let existed = entries.live(key, now).is_some();
            entries.values.remove(key);
            existed
        })
    }

    fn watch(&self, keys: &[&str]) -> Result<Watch, StoreError> {
        self.with_entries(|entries, now| {
            Watch::new(
                keys.iter()
                    .map(|key| ((*key).to_owned(), entries.version(key, now)))
                    .collect(),
            )
        })
    }

    fn commit(&self, watch: Watch, writes: &[StoreWrite]) -> Result<bool, StoreError> {
        self.with_entries(|entries, now| {
            if watch
                .versions()
                .iter()
                .any(|(key, version)| entries.version(key, now) != *version)
            {
                return false;
            }
            for write in writes {
                match write {
                    StoreWrite::Set { key, value } => entries.insert(key, value, None),
                    StoreWrite::Delete { key } => {
                        entries.values.remove(key);
                    }
                }
            }
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn keys_expire() -> Result<(), StoreError> {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1000)));
        let store = MemoryStore::with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        assert!(store.set_if_absent("lock", "a", Some(Duration::from_secs(30)))?);
        assert!(!store.set_if_absent("lock", "b", Some(Duration::from_secs(30)))?);
        clock.advance(Duration::from_secs(20));
        assert!(store.expire("lock", Duration::from_secs(30))?);
        clock.advance(Duration::from_secs(20));
        assert_eq!(store.get("lock")?.as_deref(), Some("a"));
        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get("lock")?, None);
        assert!(store.set_if_absent("lock", "b", None)?);
        Ok(())
    }

    #[test]
    fn commit_detects_conflicts() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.set("a", "1")?;
        let watch = store.watch(&["a", "b"])?;
        assert!(store.commit(watch.clone(), &[StoreWrite::set("b", 1)])?);
        assert!(!store.commit(watch, &[StoreWrite::delete("a")])?);
        assert_eq!(store.get("a")?.as_deref(), Some("1"));
        assert_eq!(store.get("b")?.as_deref(), Some("1"));
        Ok(())
    }

    #[test]
    fn delete_reports_existence() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.set("a", "1")?;
        assert!(store.delete("a")?);
        assert!(!store.delete("a")?);
        Ok(())
    }
}
