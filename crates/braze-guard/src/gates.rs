//! Moderation gate modules.
//!
//! [`ShutdownGate`] sits first in the sequential chain: while a chat is shut
//! down, every event except `/boot` is vetoed. The no-sticker pair,
//! [`NoStickerGate`] toggling the mode and [`StickerJanitor`] deleting
//! stickers while it is on, is meant to run inside a `shared_context`
//! group.

use std::sync::Arc;

use async_trait::async_trait;
use braze_core::foundation::outbound::{delete_best_effort, reply_best_effort};
use braze_core::{Event, HandleResult, Module, ModuleContext};

use crate::flags::Moderation;

const SHUTDOWN_ALIASES: [&str; 3] = ["shutdown", "halt", "poweroff"];

/// Per-chat shutdown switch.
///
/// Handles `/shutdown` (and its aliases `/halt`, `/poweroff`) and `/boot`.
/// While the chat is shut down the gate returns
/// [`HandleResult::NoMore`] for everything except `/boot`, the only
/// command permitted to pass.
pub struct ShutdownGate {
    moderation: Arc<Moderation>,
}

impl ShutdownGate {
    pub fn new(moderation: Arc<Moderation>) -> Self {
        Self { moderation }
    }
}

#[async_trait]
impl Module for ShutdownGate {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        let outbound = ctx.outbound().as_ref();
        match event.command_name() {
            Some("boot") => {
                self.moderation.boot(event.chat).await;
                reply_best_effort(outbound, event.chat, event.message_id, "Back online.").await;
                HandleResult::NextOfChain
            }
            Some(name) if SHUTDOWN_ALIASES.contains(&name) => {
                let was_down = self.moderation.shutdown(event.chat).await;
                let text = if was_down {
                    "Already down. Use /boot to wake me."
                } else {
                    "Going down now. Use /boot to wake me."
                };
                reply_best_effort(outbound, event.chat, event.message_id, text).await;
                HandleResult::NoMore
            }
            _ => {
                if self.moderation.is_shutdown(event.chat).await {
                    HandleResult::NoMore
                } else {
                    HandleResult::NextOfChain
                }
            }
        }
    }

    fn name(&self) -> Option<&str> {
        Some("shutdown_gate")
    }
}

/// Toggles no-sticker mode on `/no_sticker`.
pub struct NoStickerGate {
    moderation: Arc<Moderation>,
}

impl NoStickerGate {
    pub fn new(moderation: Arc<Moderation>) -> Self {
        Self { moderation }
    }
}

#[async_trait]
impl Module for NoStickerGate {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        if event.command_name() != Some("no_sticker") {
            return HandleResult::NextOfChain;
        }
        let enabled = self.moderation.toggle_no_sticker(event.chat).await;
        let text = if enabled {
            "No-sticker mode is on. Stickers will be removed."
        } else {
            "No-sticker mode is off."
        };
        reply_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id, text).await;
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        Some("no_sticker_gate")
    }
}

/// Deletes sticker messages while no-sticker mode is on.
pub struct StickerJanitor {
    moderation: Arc<Moderation>,
}

impl StickerJanitor {
    pub fn new(moderation: Arc<Moderation>) -> Self {
        Self { moderation }
    }
}

#[async_trait]
impl Module for StickerJanitor {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        if !event.has_sticker || !self.moderation.is_no_sticker(event.chat).await {
            return HandleResult::NextOfChain;
        }
        delete_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id).await;
        HandleResult::NoMore
    }

    fn name(&self) -> Option<&str> {
        Some("sticker_janitor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BanCooldown;
    use braze_core::{ChatId, MessageId, RecordingOutbound, UserId};
    use braze_store::MemoryStore;

    fn setup() -> (Arc<RecordingOutbound>, Arc<ModuleContext>, Arc<Moderation>) {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound.clone()));
        let moderation = Arc::new(Moderation::new(
            MemoryStore::new(),
            "test",
            BanCooldown::default(),
        ));
        (outbound, ctx, moderation)
    }

    fn event(text: &str) -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(1), UserId(2), MessageId(3))
                .text(text)
                .build(),
        )
    }

    fn sticker_event() -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(1), UserId(2), MessageId(4))
                .sticker()
                .build(),
        )
    }

    #[tokio::test]
    async fn shutdown_vetoes_everything_but_boot() {
        let (_outbound, ctx, moderation) = setup();
        let gate = ShutdownGate::new(moderation);

        assert_eq!(
            gate.handle_update(Arc::clone(&ctx), event("/ping")).await,
            HandleResult::NextOfChain
        );

        assert_eq!(
            gate.handle_update(Arc::clone(&ctx), event("/shutdown")).await,
            HandleResult::NoMore
        );
        assert_eq!(
            gate.handle_update(Arc::clone(&ctx), event("/ping")).await,
            HandleResult::NoMore
        );
        assert_eq!(
            gate.handle_update(Arc::clone(&ctx), event("plain text")).await,
            HandleResult::NoMore
        );

        assert_eq!(
            gate.handle_update(Arc::clone(&ctx), event("/boot")).await,
            HandleResult::NextOfChain
        );
        assert_eq!(
            gate.handle_update(ctx, event("/ping")).await,
            HandleResult::NextOfChain
        );
    }

    #[tokio::test]
    async fn repeated_shutdown_words_the_reply_differently() {
        let (outbound, ctx, moderation) = setup();
        let gate = ShutdownGate::new(moderation);

        gate.handle_update(Arc::clone(&ctx), event("/halt")).await;
        gate.handle_update(ctx, event("/poweroff")).await;

        let replies = outbound.reply_texts();
        assert_eq!(replies.len(), 2);
        assert_ne!(replies[0], replies[1]);
    }

    #[tokio::test]
    async fn janitor_removes_stickers_only_in_no_sticker_mode() {
        let (outbound, ctx, moderation) = setup();
        let gate = NoStickerGate::new(Arc::clone(&moderation));
        let janitor = StickerJanitor::new(moderation);

        assert_eq!(
            janitor
                .handle_update(Arc::clone(&ctx), sticker_event())
                .await,
            HandleResult::NextOfChain
        );
        assert_eq!(outbound.delete_count(), 0);

        gate.handle_update(Arc::clone(&ctx), event("/no_sticker")).await;
        assert_eq!(
            janitor
                .handle_update(Arc::clone(&ctx), sticker_event())
                .await,
            HandleResult::NoMore
        );
        assert_eq!(outbound.delete_count(), 1);

        // Plain text passes even in no-sticker mode.
        assert_eq!(
            janitor.handle_update(ctx, event("hello")).await,
            HandleResult::NextOfChain
        );
    }
}
