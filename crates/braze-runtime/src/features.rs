//! Small conversational features.
//!
//! These ride in the parallel fan-out next to the moderation commands and
//! the chat module; none of them ever vetoes an event.

use std::sync::Arc;

use async_trait::async_trait;
use braze_core::foundation::outbound::reply_best_effort;
use braze_core::{Event, HandleResult, Module, ModuleContext};
use braze_store::{KvStore, keys};
use tracing::warn;

const QUOTE_KEY: &str = "quotes";

/// `/say_hello` and `/hello_to_all`.
pub struct Hello;

#[async_trait]
impl Module for Hello {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        let text = match event.command_name() {
            Some("say_hello") => format!("Hello, {}!", event.user),
            Some("hello_to_all") => "Hello to everyone here!".to_string(),
            _ => return HandleResult::NextOfChain,
        };
        reply_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id, &text).await;
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        Some("hello")
    }
}

/// `/quote <text>` stores a quote for the chat; bare `/quote` replies with
/// a random stored one.
pub struct Quote {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl Quote {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, event: &Event) -> String {
        keys::chat(&self.prefix, QUOTE_KEY, event.chat)
    }
}

#[async_trait]
impl Module for Quote {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        let Some(command) = &event.command else {
            return HandleResult::NextOfChain;
        };
        if command.name != "quote" {
            return HandleResult::NextOfChain;
        }
        let outbound = ctx.outbound();
        let key = self.key(&event);

        let quote = command.tail.trim();
        let text = if quote.is_empty() {
            match self.store.random_member(&key).await {
                Ok(Some(quote)) => quote,
                Ok(None) => "No quotes here yet. Add one with /quote <text>.".to_string(),
                Err(err) => {
                    warn!(key, error = %err, "quote lookup failed");
                    return HandleResult::NextOfChain;
                }
            }
        } else {
            match self.store.set_add(&key, quote).await {
                Ok(()) => "Noted.".to_string(),
                Err(err) => {
                    warn!(key, error = %err, "quote store failed");
                    return HandleResult::NextOfChain;
                }
            }
        };
        reply_best_effort(outbound.as_ref(), event.chat, event.message_id, &text).await;
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        Some("quote")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braze_core::{ChatId, MessageId, RecordingOutbound, UserId};
    use braze_store::MemoryStore;

    fn ctx(outbound: Arc<RecordingOutbound>) -> Arc<ModuleContext> {
        Arc::new(ModuleContext::root(outbound))
    }

    fn event(text: &str) -> Arc<Event> {
        Arc::new(
            Event::builder(ChatId(1), UserId(2), MessageId(3))
                .text(text)
                .build(),
        )
    }

    #[tokio::test]
    async fn say_hello_greets_the_sender() {
        let outbound = RecordingOutbound::new();
        Hello
            .handle_update(ctx(outbound.clone()), event("/say_hello"))
            .await;
        assert_eq!(outbound.reply_texts(), vec!["Hello, 2!"]);
    }

    #[tokio::test]
    async fn quote_stores_then_serves() {
        let outbound = RecordingOutbound::new();
        let quote = Quote::new(MemoryStore::new(), "test");

        quote
            .handle_update(ctx(outbound.clone()), event("/quote stay curious"))
            .await;
        quote
            .handle_update(ctx(outbound.clone()), event("/quote"))
            .await;

        assert_eq!(outbound.reply_texts(), vec!["Noted.", "stay curious"]);
    }

    #[tokio::test]
    async fn bare_quote_on_empty_chat_explains_itself() {
        let outbound = RecordingOutbound::new();
        let quote = Quote::new(MemoryStore::new(), "test");
        quote
            .handle_update(ctx(outbound.clone()), event("/quote"))
            .await;
        assert!(outbound.reply_texts()[0].contains("No quotes"));
    }
}
