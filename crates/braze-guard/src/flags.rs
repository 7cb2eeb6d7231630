//! Moderation flag state machine.
//!
//! Per-chat states: Active, Shutdown. Per chat member: Normal, Banned,
//! BannerCooldown. Every flag is a TTL-backed boolean in the KV
//! collaborator; Banned and BannerCooldown revert solely by expiry. There
//! is no unban operation, and only [`Moderation::boot`] force-clears the
//! shutdown flag.
//!
//! # Store failures
//!
//! Reads fail *open* (a store outage must not silence every chat): a failed
//! `is_banned` / `is_shutdown` / `is_no_sticker` read is logged and treated
//! as "flag absent". The one deliberate exception is
//! [`Moderation::is_banner_cooling`], which fails *closed* so that a store
//! outage cannot be used for rapid repeat banning.

use std::sync::Arc;
use std::time::Duration;

use braze_core::{ChatId, UserId};
use braze_store::{keys, KvStore};
use tracing::error;

const BANNED: &str = "banned";
const BANNER: &str = "banner";
const SHUTDOWN: &str = "shutdown";
const NO_STICKER: &str = "no_sticker";

/// The issuer-cooldown function: monotone in the ban duration, clamped.
///
/// Charging the issuer a cooldown proportional to the ban they hand out
/// prevents rapid repeat banning.
#[derive(Debug, Clone, Copy)]
pub struct BanCooldown {
    pub ratio: f64,
    pub min: Duration,
    pub max: Duration,
}

impl Default for BanCooldown {
    fn default() -> Self {
        Self {
            ratio: 2.0,
            min: Duration::from_secs(60),
            max: Duration::from_secs(20 * 60),
        }
    }
}

impl BanCooldown {
    /// Cooldown charged for a ban of duration `d`.
    pub fn for_duration(&self, d: Duration) -> Duration {
        let scaled = d.mul_f64(self.ratio.max(0.0));
        scaled.clamp(self.min, self.max)
    }
}

/// Outcome of a ban attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    /// The target is banned for the given duration.
    Banned(Duration),
    /// The issuer tried to ban themselves; use `ban_self` for that.
    SelfTarget,
    /// The issuer is currently banned and may not ban others.
    IssuerBanned,
    /// The issuer is still cooling down from a previous ban.
    IssuerCooling,
    /// The flag write failed; nothing happened.
    StoreFailed,
}

/// Moderation flags over the KV collaborator.
pub struct Moderation {
    store: Arc<dyn KvStore>,
    prefix: String,
    cooldown: BanCooldown,
}

impl Moderation {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, cooldown: BanCooldown) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            cooldown,
        }
    }

    /// Reads a flag, failing open: an error or absent key is `false`.
    async fn read_flag(&self, key: &str) -> bool {
        match self.store.get_bool(key).await {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                error!(key, error = %err, "flag read failed, treating as absent");
                false
            }
        }
    }

    async fn write_flag(&self, key: &str, value: bool, ttl: Option<Duration>) -> bool {
        match self.store.set_bool(key, value, ttl).await {
            Ok(()) => true,
            Err(err) => {
                error!(key, error = %err, "flag write failed");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Bans
    // ------------------------------------------------------------------

    /// Attempts to ban `target` in `chat` for `duration`, on behalf of
    /// `issuer`. On success the issuer is charged the ban cooldown.
    pub async fn ban(
        &self,
        chat: ChatId,
        issuer: UserId,
        target: UserId,
        duration: Duration,
    ) -> BanOutcome {
        if target == issuer {
            return BanOutcome::SelfTarget;
        }
        if self.is_banned(chat, issuer).await {
            return BanOutcome::IssuerBanned;
        }
        if self.is_banner_cooling(chat, issuer).await {
            return BanOutcome::IssuerCooling;
        }

        self.charge_cooldown(chat, issuer, duration).await;
        let key = keys::chat_member(&self.prefix, BANNED, chat, target);
        if self.write_flag(&key, true, Some(duration)).await {
            BanOutcome::Banned(duration)
        } else {
            BanOutcome::StoreFailed
        }
    }

    /// Bans `user` at their own request. No cooldown bookkeeping.
    pub async fn ban_self(&self, chat: ChatId, user: UserId, duration: Duration) -> bool {
        let key = keys::chat_member(&self.prefix, BANNED, chat, user);
        self.write_flag(&key, true, Some(duration)).await
    }

    pub async fn is_banned(&self, chat: ChatId, user: UserId) -> bool {
        self.read_flag(&keys::chat_member(&self.prefix, BANNED, chat, user))
            .await
    }

    /// Remaining ban duration, when the user is currently banned.
    pub async fn banned_remaining(&self, chat: ChatId, user: UserId) -> Option<Duration> {
        if !self.is_banned(chat, user).await {
            return None;
        }
        let key = keys::chat_member(&self.prefix, BANNED, chat, user);
        match self.store.remaining_ttl(&key).await {
            Ok(remaining) => remaining.filter(|d| !d.is_zero()),
            Err(err) => {
                error!(key, error = %err, "ttl read failed");
                None
            }
        }
    }

    /// Extends a live ban by `extra`. Returns `false` when the target is
    /// not currently banned; an expired ban is never resurrected. The
    /// issuer is charged the cooldown either way.
    pub async fn add_ban_duration(
        &self,
        chat: ChatId,
        issuer: UserId,
        target: UserId,
        extra: Duration,
    ) -> bool {
        self.charge_cooldown(chat, issuer, extra).await;
        let Some(remaining) = self.banned_remaining(chat, target).await else {
            return false;
        };
        let key = keys::chat_member(&self.prefix, BANNED, chat, target);
        match self.store.expire(&key, remaining + extra).await {
            Ok(extended) => extended,
            Err(err) => {
                error!(key, error = %err, "ban extension failed");
                false
            }
        }
    }

    async fn charge_cooldown(&self, chat: ChatId, issuer: UserId, duration: Duration) {
        let cooldown = self.cooldown.for_duration(duration);
        let key = keys::chat_member(&self.prefix, BANNER, chat, issuer);
        self.write_flag(&key, true, Some(cooldown)).await;
    }

    /// Whether the issuer is still cooling down from a previous ban.
    /// Fails closed: a store error reads as "still cooling".
    pub async fn is_banner_cooling(&self, chat: ChatId, user: UserId) -> bool {
        let key = keys::chat_member(&self.prefix, BANNER, chat, user);
        match self.store.get_bool(&key).await {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                error!(key, error = %err, "cooldown read failed, assuming cooling");
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Sets the chat to Shutdown. Idempotent; returns the prior state so
    /// the caller can word the reply accordingly.
    pub async fn shutdown(&self, chat: ChatId) -> bool {
        let was = self.is_shutdown(chat).await;
        let key = keys::chat(&self.prefix, SHUTDOWN, chat);
        self.write_flag(&key, true, None).await;
        was
    }

    /// Unconditionally clears the Shutdown state.
    pub async fn boot(&self, chat: ChatId) {
        let key = keys::chat(&self.prefix, SHUTDOWN, chat);
        self.write_flag(&key, false, None).await;
    }

    pub async fn is_shutdown(&self, chat: ChatId) -> bool {
        self.read_flag(&keys::chat(&self.prefix, SHUTDOWN, chat)).await
    }

    // ------------------------------------------------------------------
    // No-sticker mode
    // ------------------------------------------------------------------

    /// Flips no-sticker mode, returning the new state.
    pub async fn toggle_no_sticker(&self, chat: ChatId) -> bool {
        let key = keys::chat(&self.prefix, NO_STICKER, chat);
        match self.store.toggle_bool(&key).await {
            Ok(value) => value,
            Err(err) => {
                error!(key, error = %err, "no-sticker toggle failed");
                false
            }
        }
    }

    pub async fn is_no_sticker(&self, chat: ChatId) -> bool {
        self.read_flag(&keys::chat(&self.prefix, NO_STICKER, chat))
            .await
    }
}
