//! The ban command family.
//!
//! `/ban` and `/ban_soft` write the Banned flag through [`Moderation`];
//! `/fake_ban` only talks. `/ban_myself` bans the issuer for a random
//! duration. `/add_ban` extends a live ban and refuses to resurrect an
//! expired one. The target of a reply-addressed command is the sender of
//! the replied-to message; otherwise the first numeric argument is used.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use braze_core::foundation::outbound::reply_best_effort;
use braze_core::{Event, HandleResult, Module, ModuleContext, UserId};
use rand::Rng;
use tracing::debug;

use crate::flags::{BanOutcome, Moderation};

/// Durations used by the ban commands.
#[derive(Debug, Clone, Copy)]
pub struct BanSettings {
    /// Ban length when the command gives none.
    pub default_duration: Duration,
    /// Range for the `/ban_myself` random duration.
    pub self_ban_min: Duration,
    pub self_ban_max: Duration,
}

impl Default for BanSettings {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_secs(60),
            self_ban_min: Duration::from_secs(60),
            self_ban_max: Duration::from_secs(120),
        }
    }
}

/// Handles `/ban`, `/ban_soft`, `/fake_ban`, `/ban_myself`,
/// `/fake_ban_myself` and `/add_ban`.
pub struct BanCommands {
    moderation: Arc<Moderation>,
    settings: BanSettings,
}

impl BanCommands {
    pub fn new(moderation: Arc<Moderation>, settings: BanSettings) -> Self {
        Self {
            moderation,
            settings,
        }
    }

    /// Replied-to sender first, then a numeric argument.
    fn resolve_target(event: &Event) -> Option<UserId> {
        if let Some(user) = event.reply_to.and_then(|r| r.user) {
            return Some(user);
        }
        event
            .command
            .as_ref()
            .and_then(|c| c.first_arg())
            .and_then(|arg| arg.parse::<i64>().ok())
            .map(UserId)
    }

    /// Duration argument in seconds; position depends on whether the target
    /// came from a reply.
    fn resolve_duration(&self, event: &Event) -> Duration {
        let args = event.command.as_ref().map(|c| c.args.as_slice()).unwrap_or(&[]);
        let position = if event.reply_to.and_then(|r| r.user).is_some() {
            0
        } else {
            1
        };
        args.get(position)
            .and_then(|arg| arg.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.settings.default_duration)
    }

    fn random_self_duration(&self) -> Duration {
        let min = self.settings.self_ban_min.min(self.settings.self_ban_max);
        let max = self.settings.self_ban_min.max(self.settings.self_ban_max);
        rand::thread_rng().gen_range(min..=max)
    }

    async fn run_ban(&self, ctx: &ModuleContext, event: &Event, soft: bool) {
        let outbound = ctx.outbound().as_ref();
        let Some(target) = Self::resolve_target(event) else {
            reply_best_effort(
                outbound,
                event.chat,
                event.message_id,
                "Reply to a message or give a user id to ban.",
            )
            .await;
            return;
        };

        let duration = self.resolve_duration(event);
        let outcome = self
            .moderation
            .ban(event.chat, event.user, target, duration)
            .await;
        debug!(chat = %event.chat, issuer = %event.user, %target, ?outcome, "ban attempt");

        let text = match outcome {
            BanOutcome::Banned(d) if soft => {
                format!("{target} is soft-banned for {}s. Be gentle.", d.as_secs())
            }
            BanOutcome::Banned(d) => format!("{target} is banned for {}s.", d.as_secs()),
            BanOutcome::SelfTarget => "Use /ban_myself for that.".to_string(),
            BanOutcome::IssuerBanned => "Banned users don't get to ban.".to_string(),
            BanOutcome::IssuerCooling => "You are still cooling down.".to_string(),
            BanOutcome::StoreFailed => "The ban didn't stick. Try again later.".to_string(),
        };
        reply_best_effort(outbound, event.chat, event.message_id, &text).await;
    }

    async fn run_fake_ban(&self, ctx: &ModuleContext, event: &Event) {
        // Client-visible only; the Banned flag is never written.
        let target = Self::resolve_target(event).unwrap_or(event.user);
        let duration = self.resolve_duration(event);
        let text = format!("{target} is banned for {}s.", duration.as_secs());
        reply_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id, &text).await;
    }

    async fn run_ban_self(&self, ctx: &ModuleContext, event: &Event, fake: bool) {
        let duration = self.random_self_duration();
        if !fake && !self.moderation.ban_self(event.chat, event.user, duration).await {
            reply_best_effort(
                ctx.outbound().as_ref(),
                event.chat,
                event.message_id,
                "The ban didn't stick. Try again later.",
            )
            .await;
            return;
        }
        let text = format!("Enjoy {}s of silence.", duration.as_secs());
        reply_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id, &text).await;
    }

    async fn run_add_ban(&self, ctx: &ModuleContext, event: &Event) {
        let outbound = ctx.outbound().as_ref();
        let Some(target) = Self::resolve_target(event) else {
            reply_best_effort(
                outbound,
                event.chat,
                event.message_id,
                "Reply to a message or give a user id.",
            )
            .await;
            return;
        };
        let extra = self.resolve_duration(event);
        let extended = self
            .moderation
            .add_ban_duration(event.chat, event.user, target, extra)
            .await;
        let text = if extended {
            format!("Added {}s to {target}'s ban.", extra.as_secs())
        } else {
            format!("{target} is not banned right now.")
        };
        reply_best_effort(outbound, event.chat, event.message_id, &text).await;
    }
}

#[async_trait]
impl Module for BanCommands {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        match event.command_name() {
            Some("ban") => self.run_ban(&ctx, &event, false).await,
            Some("ban_soft") => self.run_ban(&ctx, &event, true).await,
            Some("fake_ban") => self.run_fake_ban(&ctx, &event).await,
            Some("ban_myself") => self.run_ban_self(&ctx, &event, false).await,
            Some("fake_ban_myself") => self.run_ban_self(&ctx, &event, true).await,
            Some("add_ban") => self.run_add_ban(&ctx, &event).await,
            _ => {}
        }
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        Some("ban_commands")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::BanCooldown;
    use braze_core::{ChatId, MessageId, RecordingOutbound};
    use braze_store::{ManualClock, MemoryStore};

    const CHAT: ChatId = ChatId(1);
    const ALICE: UserId = UserId(10);
    const BOB: UserId = UserId(20);

    fn setup() -> (
        Arc<RecordingOutbound>,
        Arc<ModuleContext>,
        Arc<Moderation>,
        BanCommands,
    ) {
        let outbound = RecordingOutbound::new();
        let ctx = Arc::new(ModuleContext::root(outbound.clone()));
        let moderation = Arc::new(Moderation::new(
            MemoryStore::with_clock(ManualClock::new()),
            "test",
            BanCooldown::default(),
        ));
        let commands = BanCommands::new(Arc::clone(&moderation), BanSettings::default());
        (outbound, ctx, moderation, commands)
    }

    fn reply_command(text: &str, issuer: UserId, target: UserId) -> Arc<Event> {
        Arc::new(
            Event::builder(CHAT, issuer, MessageId(3))
                .text(text)
                .reply_to(MessageId(1), Some(target))
                .build(),
        )
    }

    #[tokio::test]
    async fn ban_by_reply_writes_the_flag() {
        let (_outbound, ctx, moderation, commands) = setup();
        commands
            .handle_update(ctx, reply_command("/ban 30", ALICE, BOB))
            .await;
        assert!(moderation.is_banned(CHAT, BOB).await);
        assert_eq!(
            moderation.banned_remaining(CHAT, BOB).await,
            Some(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn ban_by_argument_uses_default_duration() {
        let (_outbound, ctx, moderation, commands) = setup();
        let event = Arc::new(
            Event::builder(CHAT, ALICE, MessageId(3))
                .text(&format!("/ban {BOB}"))
                .build(),
        );
        commands.handle_update(ctx, event).await;
        assert!(moderation.is_banned(CHAT, BOB).await);
        assert_eq!(
            moderation.banned_remaining(CHAT, BOB).await,
            Some(BanSettings::default().default_duration)
        );
    }

    #[tokio::test]
    async fn fake_ban_never_writes_the_flag() {
        let (outbound, ctx, moderation, commands) = setup();
        commands
            .handle_update(ctx, reply_command("/fake_ban 30", ALICE, BOB))
            .await;
        assert!(!moderation.is_banned(CHAT, BOB).await);
        assert_eq!(outbound.reply_texts().len(), 1);
    }

    #[tokio::test]
    async fn ban_myself_bans_within_the_configured_range() {
        let (_outbound, ctx, moderation, commands) = setup();
        let event = Arc::new(
            Event::builder(CHAT, ALICE, MessageId(3))
                .text("/ban_myself")
                .build(),
        );
        commands.handle_update(ctx, event).await;

        let remaining = moderation.banned_remaining(CHAT, ALICE).await.unwrap();
        let settings = BanSettings::default();
        assert!(remaining >= settings.self_ban_min);
        assert!(remaining <= settings.self_ban_max);
    }

    #[tokio::test]
    async fn add_ban_refuses_unbanned_targets() {
        let (outbound, ctx, _moderation, commands) = setup();
        commands
            .handle_update(ctx, reply_command("/add_ban 30", ALICE, BOB))
            .await;
        let replies = outbound.reply_texts();
        assert!(replies[0].contains("not banned"));
    }

    #[tokio::test]
    async fn missing_target_asks_for_one() {
        let (outbound, ctx, _moderation, commands) = setup();
        let event = Arc::new(Event::builder(CHAT, ALICE, MessageId(3)).text("/ban").build());
        commands.handle_update(ctx, event).await;
        assert!(outbound.reply_texts()[0].contains("Reply to a message"));
    }
}
