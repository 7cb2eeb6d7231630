//! # Braze Guard
//!
//! Moderation and rate limiting for the braze chat core: the TTL-backed
//! flag state machine ([`Moderation`]), the ban command family, the
//! shutdown and no-sticker gates, and the per-(chat, user) token-bucket
//! rate limiter.
//!
//! The gates are ordinary [`Module`]s meant to be wired ahead of the
//! feature fan-out in a `sequential` chain, so their veto suppresses
//! everything downstream for the offending event.
//!
//! [`Module`]: braze_core::Module

pub mod commands;
pub mod flags;
pub mod gates;
pub mod rate;

pub use commands::{BanCommands, BanSettings};
pub use flags::{BanCooldown, BanOutcome, Moderation};
pub use gates::{NoStickerGate, ShutdownGate, StickerJanitor};
pub use rate::{RateLimit, RateLimitSettings};
