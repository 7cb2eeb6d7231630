//! Per-(chat, user) token-bucket rate limiting.
//!
//! Each chat member gets a bucket lazily on their first observed message,
//! starting full and charged immediately. Text costs `cost` tokens and
//! stickers `sticker_cost`; when the bucket cannot cover the charge, the
//! triggering message is deleted best effort and the event is vetoed
//! downstream (`NoMore`). Private chats are exempt.
//!
//! The bucket map is shared mutable state across per-event tasks; get-or-
//! create happens under one lock so no bucket creation is ever lost. The
//! map is never evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use braze_core::foundation::outbound::delete_best_effort;
use braze_core::{ChatId, ChatKind, Event, HandleResult, Module, ModuleContext, UserId};
use braze_store::{Clock, SystemClock};
use parking_lot::Mutex;
use tracing::debug;

/// Bucket sizing and message costs.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    /// Maximum tokens a bucket holds (burst size).
    pub capacity: u32,
    /// Tokens restored per second.
    pub refill_per_sec: f64,
    /// Tokens charged per text message.
    pub cost: u32,
    /// Tokens charged per sticker.
    pub sticker_cost: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            capacity: 20,
            refill_per_sec: 0.5,
            cost: 1,
            sticker_cost: 3,
        }
    }
}

struct TokenBucket {
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    fn full(settings: &RateLimitSettings, now: Instant) -> Self {
        Self {
            tokens: f64::from(settings.capacity),
            refilled_at: now,
        }
    }

    fn try_take(&mut self, charge: u32, settings: &RateLimitSettings, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.refilled_at).as_secs_f64();
        self.tokens =
            (self.tokens + elapsed * settings.refill_per_sec).min(f64::from(settings.capacity));
        self.refilled_at = now;

        let charge = f64::from(charge);
        if self.tokens >= charge {
            self.tokens -= charge;
            true
        } else {
            false
        }
    }
}

/// The rate-limiting module. Wire it early in the sequential chain so a
/// veto suppresses every downstream feature.
pub struct RateLimit {
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
    buckets: Mutex<HashMap<(ChatId, UserId), TokenBucket>>,
}

impl RateLimit {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn allow(&self, chat: ChatId, user: UserId, charge: u32) -> bool {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        buckets
            .entry((chat, user))
            .or_insert_with(|| TokenBucket::full(&self.settings, now))
            .try_take(charge, &self.settings, now)
    }
}

#[async_trait]
impl Module for RateLimit {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        if event.chat_kind == ChatKind::Private {
            return HandleResult::NextOfChain;
        }

        let charge = if event.has_sticker {
            self.settings.sticker_cost
        } else {
            self.settings.cost
        };
        if self.allow(event.chat, event.user, charge) {
            return HandleResult::NextOfChain;
        }

        debug!(chat = %event.chat, user = %event.user, "rate limited, deleting message");
        delete_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id).await;
        HandleResult::NoMore
    }

    fn name(&self) -> Option<&str> {
        Some("rate_limit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braze_core::{MessageId, RecordingOutbound};
    use braze_store::ManualClock;
    use std::time::Duration;

    fn burst_only(capacity: u32) -> RateLimitSettings {
        RateLimitSettings {
            capacity,
            refill_per_sec: 0.0,
            cost: 1,
            sticker_cost: 2,
        }
    }

    fn message(chat: i64, user: i64, n: i64) -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(chat), UserId(user), MessageId(n))
                .text("hello")
                .build(),
        )
    }

    fn private_message(n: i64) -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(1), UserId(2), MessageId(n))
                .text("hello")
                .private()
                .build(),
        )
    }

    fn sticker(chat: i64, user: i64, n: i64) -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(chat), UserId(user), MessageId(n))
                .sticker()
                .build(),
        )
    }

    #[tokio::test]
    async fn sixth_message_is_deleted_and_vetoed() {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound.clone()));
        let limiter = RateLimit::with_clock(burst_only(5), ManualClock::new());

        for n in 0..5 {
            let result = limiter
                .handle_update(Arc::clone(&ctx), message(1, 2, n))
                .await;
            assert_eq!(result, HandleResult::NextOfChain);
        }
        let result = limiter.handle_update(ctx, message(1, 2, 5)).await;
        assert_eq!(result, HandleResult::NoMore);
        assert_eq!(outbound.delete_count(), 1);
    }

    #[tokio::test]
    async fn buckets_are_independent_per_chat_member() {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound));
        let limiter = RateLimit::with_clock(burst_only(1), ManualClock::new());

        assert_eq!(
            limiter
                .handle_update(Arc::clone(&ctx), message(1, 2, 1))
                .await,
            HandleResult::NextOfChain
        );
        // Same user, other chat: fresh bucket.
        assert_eq!(
            limiter
                .handle_update(Arc::clone(&ctx), message(9, 2, 2))
                .await,
            HandleResult::NextOfChain
        );
        // Same (chat, user) again: empty bucket.
        assert_eq!(
            limiter.handle_update(ctx, message(1, 2, 3)).await,
            HandleResult::NoMore
        );
    }

    #[tokio::test]
    async fn refill_restores_tokens() {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound));
        let clock = ManualClock::new();
        let settings = RateLimitSettings {
            capacity: 1,
            refill_per_sec: 1.0,
            cost: 1,
            sticker_cost: 1,
        };
        let limiter = RateLimit::with_clock(settings, clock.clone());

        assert_eq!(
            limiter
                .handle_update(Arc::clone(&ctx), message(1, 2, 1))
                .await,
            HandleResult::NextOfChain
        );
        assert_eq!(
            limiter
                .handle_update(Arc::clone(&ctx), message(1, 2, 2))
                .await,
            HandleResult::NoMore
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(
            limiter.handle_update(ctx, message(1, 2, 3)).await,
            HandleResult::NextOfChain
        );
    }

    #[tokio::test]
    async fn stickers_cost_more() {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound));
        let limiter = RateLimit::with_clock(burst_only(3), ManualClock::new());

        assert_eq!(
            limiter
                .handle_update(Arc::clone(&ctx), sticker(1, 2, 1))
                .await,
            HandleResult::NextOfChain
        );
        // One token left; a second sticker (cost 2) does not fit.
        assert_eq!(
            limiter.handle_update(ctx, sticker(1, 2, 2)).await,
            HandleResult::NoMore
        );
    }

    #[tokio::test]
    async fn private_chats_are_exempt() {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound));
        let limiter = RateLimit::with_clock(burst_only(1), ManualClock::new());

        for n in 0..10 {
            assert_eq!(
                limiter
                    .handle_update(Arc::clone(&ctx), private_message(n))
                    .await,
                HandleResult::NextOfChain
            );
        }
    }
}
