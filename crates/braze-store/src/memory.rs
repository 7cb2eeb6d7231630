//! In-memory reference store.
//!
//! [`MemoryStore`] implements [`KvStore`] over a locked map with per-entry
//! expiry timestamps checked on every read against an injected [`Clock`].
//! An expired entry behaves exactly like an absent key and is purged when
//! touched. With a [`ManualClock`] this makes TTL behavior fully
//! deterministic in tests.
//!
//! [`ManualClock`]: crate::clock::ManualClock

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;

use crate::clock::{Clock, SystemClock};
use crate::kv::{KvStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Bool(bool),
    Raw(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// An in-process [`KvStore`].
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates a store over the real clock.
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store over an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        })
    }

    fn expiry(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|d| self.clock.now() + d)
    }

    /// Runs `f` over the live entry for `key`, purging it first if expired.
    fn with_live<R>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> R) -> R {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now)
        {
            entries.remove(key);
        }
        f(entries.get_mut(key))
    }

    fn insert(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let expires_at = self.expiry(ttl);
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_bool(&self, key: &str) -> StoreResult<Option<bool>> {
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Bool(b),
                ..
            }) => Ok(Some(*b)),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        })
    }

    async fn set_bool(&self, key: &str, value: bool, ttl: Option<Duration>) -> StoreResult<()> {
        self.insert(key, Value::Bool(value), ttl);
        Ok(())
    }

    async fn toggle_bool(&self, key: &str) -> StoreResult<bool> {
        let expiry_for_new = self.expiry(None);
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Bool(b),
                ..
            }) => {
                *b = !*b;
                Ok(Some(*b))
            }
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        })
        .map(|toggled| toggled.unwrap_or(true))
        .inspect(|&value| {
            if value {
                // Absent key toggled to true: materialize it.
                let mut entries = self.entries.lock();
                entries.entry(key.to_string()).or_insert(Entry {
                    value: Value::Bool(true),
                    expires_at: expiry_for_new,
                });
            }
        })
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = self.clock.now();
        self.with_live(key, |entry| {
            Ok(entry
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(now)))
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let at = self.clock.now() + ttl;
        self.with_live(key, |entry| match entry {
            None => Ok(false),
            Some(e) => {
                e.expires_at = Some(at);
                Ok(true)
            }
        })
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()> {
        self.with_live(key, |entry| match entry {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                set.insert(member.to_string());
                Ok(true)
            }
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
            None => Ok(false),
        })
        .map(|existed| {
            if !existed {
                let mut set = HashSet::new();
                set.insert(member.to_string());
                self.insert(key, Value::Set(set), None);
            }
        })
    }

    async fn random_member(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().choose(&mut rand::thread_rng()).cloned()),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        })
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_live(key, |entry| match entry {
            None => Ok(None),
            Some(Entry {
                value: Value::Raw(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType { key: key.into() }),
        })
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.insert(key, Value::Raw(value.to_string()), ttl);
        Ok(())
    }
}
