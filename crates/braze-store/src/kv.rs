//! The KV-with-TTL collaborator interface.
//!
//! Moderation flags, random quote sets, and serialized conversation history
//! all live behind [`KvStore`]. The production store is an external system
//! (a non-goal to implement here); [`MemoryStore`] is the in-process
//! reference implementation.
//!
//! Two properties the moderation state machine depends on:
//!
//! - "key absent" is distinct from "stored false": [`KvStore::get_bool`]
//!   returns `Option<bool>`;
//! - [`KvStore::set_bool`] with a TTL is atomic set-with-expiry, so flag
//!   writes need no client-side locking.
//!
//! [`MemoryStore`]: crate::memory::MemoryStore

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend failed or was unreachable.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The key holds a value of a different shape than the operation expects.
    #[error("wrong value type for key '{key}'")]
    WrongType { key: String },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow async interface over a key-value store with per-key expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a boolean flag. `None` means the key is absent (or expired),
    /// which is not the same as `Some(false)`.
    async fn get_bool(&self, key: &str) -> StoreResult<Option<bool>>;

    /// Writes a boolean flag, atomically attaching an expiry when `ttl` is
    /// set. `None` means the key never expires.
    async fn set_bool(&self, key: &str, value: bool, ttl: Option<Duration>) -> StoreResult<()>;

    /// Flips a boolean flag and returns the new value. An absent key
    /// toggles to `true`. Any existing expiry is preserved.
    async fn toggle_bool(&self, key: &str) -> StoreResult<bool>;

    /// Remaining time until the key expires. `None` when the key is absent
    /// or has no expiry.
    async fn remaining_ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Replaces the expiry of an existing key. Returns `false` when the key
    /// is absent (nothing to extend).
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Adds a member to the set stored at `key`.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<()>;

    /// Returns a uniformly random member of the set at `key`, or `None`
    /// when the set is absent or empty.
    async fn random_member(&self, key: &str) -> StoreResult<Option<String>>;

    /// Reads a raw string value (serialized conversation history).
    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a raw string value, with an optional expiry.
    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;
}
