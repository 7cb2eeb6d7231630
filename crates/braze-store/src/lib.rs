//! # Braze Store
//!
//! The KV-with-TTL collaborator interface for the braze chat core, an
//! injectable clock, and an in-memory reference implementation.
//!
//! Moderation flags auto-revert by expiry alone, so the store contract is
//! built around atomic set-with-expiry and reads that distinguish "absent"
//! from "false". See [`KvStore`] for the full operation set.

pub mod clock;
pub mod keys;
pub mod kv;
pub mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use kv::{KvStore, StoreError, StoreResult};
pub use memory::MemoryStore;
