//! The `/chat` and `/chat_stream` handler.
//!
//! The handler itself stays fast: it validates the prompt, assembles the
//! request turns, sends the placeholder reply, and offers the task to the
//! bounded queue. All slow work happens in the worker behind the queue.

use std::sync::Arc;

use async_trait::async_trait;
use braze_core::foundation::outbound::reply_best_effort;
use braze_core::{Event, HandleResult, Module, ModuleContext};
use tracing::{debug, warn};

use crate::api::Turn;
use crate::history::History;
use crate::service::{ChatService, ChatTask, DeliveryMode};
use crate::settings::ChatSettings;

const CHAT_COMMAND: &str = "chat";
const CHAT_STREAM_COMMAND: &str = "chat_stream";

/// Bridges chat commands to the completion worker.
pub struct ChatModule {
    service: ChatService,
    history: History,
    settings: ChatSettings,
}

impl ChatModule {
    pub fn new(service: ChatService, history: History, settings: ChatSettings) -> Self {
        Self {
            service,
            history,
            settings,
        }
    }

    /// System turn, prior context when replying to one of our answers, then
    /// the user prompt.
    async fn assemble_turns(&self, event: &Event, prompt: &str) -> Vec<Turn> {
        let mut turns = Vec::new();
        if let Some(system) = &self.settings.system_prompt {
            turns.push(Turn::system(system.clone()));
        }
        if self.history.keep_context() > 0 {
            if let Some(reply_to) = &event.reply_to {
                turns.extend(self.history.load(event.chat, reply_to.message_id).await);
            }
        }
        turns.push(Turn::user(prompt.to_string()));
        turns
    }
}

#[async_trait]
impl Module for ChatModule {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        let Some(command) = &event.command else {
            return HandleResult::NextOfChain;
        };
        let mode = match command.name.as_str() {
            CHAT_COMMAND => DeliveryMode::Buffered,
            CHAT_STREAM_COMMAND => DeliveryMode::Streaming,
            _ => return HandleResult::NextOfChain,
        };
        let outbound = ctx.outbound();

        let prompt = command.tail.trim();
        if prompt.is_empty() {
            reply_best_effort(
                outbound.as_ref(),
                event.chat,
                event.message_id,
                &self.settings.greeting_text,
            )
            .await;
            return HandleResult::NextOfChain;
        }
        if prompt.chars().count() > self.settings.prompt_limit {
            reply_best_effort(
                outbound.as_ref(),
                event.chat,
                event.message_id,
                &self.settings.too_long_text,
            )
            .await;
            return HandleResult::NextOfChain;
        }

        let turns = self.assemble_turns(&event, prompt).await;

        // The placeholder goes out before admission so the user sees an
        // immediate reaction; if it cannot be sent there is nothing to edit
        // later and the request is dropped.
        let placeholder = match outbound
            .send_reply(event.chat, event.message_id, &self.settings.placeholder_text)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                warn!(chat = %event.chat, error = %err, "placeholder send failed, dropping request");
                return HandleResult::NextOfChain;
            }
        };

        let admitted = self.service.try_admit(ChatTask {
            chat: event.chat,
            placeholder,
            turns,
            mode,
        });
        if !admitted {
            debug!(chat = %event.chat, "completion queue full");
            if let Err(err) = outbound
                .edit(event.chat, placeholder, &self.settings.busy_text)
                .await
            {
                warn!(chat = %event.chat, error = %err, "busy notice failed");
            }
        }
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        Some("chat")
    }
}
