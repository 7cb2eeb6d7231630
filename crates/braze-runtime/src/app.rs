//! Application assembly.
//!
//! Wires configuration, the external collaborators, and the guard, feature
//! and chat modules into the dispatch tree:
//!
//! ```text
//! sequential([
//!     isolated_chat(ShutdownGate),        per-chat gate, vetoes while down
//!     RateLimit,                          vetoes and deletes over-budget
//!     parallel([
//!         Hello, Quote, BanCommands,
//!         shared_context([NoStickerGate, StickerJanitor]),
//!         deferred(ChatModule),
//!     ]),
//! ])
//! ```

use std::sync::Arc;

use braze_chat::{ChatModule, ChatService, CompletionApi, History};
use braze_core::prelude::*;
use braze_core::{BoxedModule, Dispatcher, Event, Outbound};
use braze_guard::{
    BanCommands, Moderation, NoStickerGate, RateLimit, ShutdownGate, StickerJanitor,
};
use braze_store::KvStore;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::BrazeConfig;
use crate::features::{Hello, Quote};

/// External collaborators the core is wired against.
pub struct AppDeps {
    pub store: Arc<dyn KvStore>,
    pub outbound: Arc<dyn Outbound>,
    pub completion: Arc<dyn CompletionApi>,
}

/// The assembled application: a dispatcher over the full tree, with the
/// completion consumer already running.
pub struct App {
    dispatcher: Dispatcher,
}

impl App {
    /// Builds the tree and starts the completion consumer.
    ///
    /// Must run inside a tokio runtime.
    pub fn start(config: &BrazeConfig, deps: AppDeps) -> Self {
        let prefix = config.store.prefix.clone();
        let moderation = Arc::new(Moderation::new(
            Arc::clone(&deps.store),
            prefix.clone(),
            config.moderation.to_cooldown(),
        ));

        let chat_settings = config.chat.to_settings();
        let history = History::new(
            Arc::clone(&deps.store),
            prefix.clone(),
            chat_settings.keep_context,
        );
        let service = ChatService::spawn(
            Arc::clone(&deps.completion),
            Arc::clone(&deps.outbound),
            history.clone(),
            chat_settings.clone(),
        );
        let chat = ChatModule::new(service, history, chat_settings);

        let root = build_tree(TreeParts {
            rate_limit: RateLimit::new(config.rate_limit.to_settings()),
            ban_commands: BanCommands::new(
                Arc::clone(&moderation),
                config.moderation.to_ban_settings(),
            ),
            quote: Quote::new(Arc::clone(&deps.store), prefix),
            chat,
            moderation,
        });

        info!("dispatch tree assembled");
        Self {
            dispatcher: Dispatcher::new(root, deps.outbound),
        }
    }

    /// Dispatches one event as an independent task.
    pub fn dispatch(&self, event: Event) {
        self.dispatcher.dispatch(event);
    }

    /// Drains an inbound event source until it closes.
    pub async fn run(&self, events: mpsc::Receiver<Event>) {
        self.dispatcher.run(events).await;
    }
}

/// Concrete modules the tree is assembled from.
pub struct TreeParts {
    pub moderation: Arc<Moderation>,
    pub rate_limit: RateLimit,
    pub ban_commands: BanCommands,
    pub quote: Quote,
    pub chat: ChatModule,
}

/// Assembles the dispatch tree from its concrete modules.
pub fn build_tree(parts: TreeParts) -> BoxedModule {
    let shutdown_moderation = Arc::clone(&parts.moderation);
    sequential(vec![
        isolated_chat(move |_| {
            named(
                "shutdown",
                Arc::new(ShutdownGate::new(Arc::clone(&shutdown_moderation))),
            )
        }),
        Arc::new(parts.rate_limit),
        parallel(vec![
            Arc::new(Hello),
            Arc::new(parts.quote),
            Arc::new(parts.ban_commands),
            shared_context(vec![
                Arc::new(NoStickerGate::new(Arc::clone(&parts.moderation))),
                Arc::new(StickerJanitor::new(parts.moderation)),
            ]),
            deferred(Arc::new(parts.chat)),
        ]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use braze_chat::{CompletionError, FragmentStream, Turn};
    use braze_core::{ChatId, MessageId, RecordingOutbound, UserId};
    use braze_store::MemoryStore;
    use std::time::Duration;

    const CHAT: ChatId = ChatId(1);
    const ADMIN: UserId = UserId(10);

    struct CannedApi;

    #[async_trait::async_trait]
    impl CompletionApi for CannedApi {
        async fn complete(&self, _: &[Turn]) -> Result<String, CompletionError> {
            Ok("a canned answer".to_string())
        }

        async fn complete_stream(&self, _: &[Turn]) -> Result<FragmentStream, CompletionError> {
            Err(CompletionError::Api("not streamed in tests".into()))
        }
    }

    fn app() -> (App, Arc<RecordingOutbound>) {
        let outbound = RecordingOutbound::new();
        let app = App::start(
            &BrazeConfig::default(),
            AppDeps {
                store: MemoryStore::new(),
                outbound: outbound.clone(),
                completion: Arc::new(CannedApi),
            },
        );
        (app, outbound)
    }

    fn message(id: i64, user: UserId, text: &str) -> Event {
        Event::builder(CHAT, user, MessageId(id)).text(text).build()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn hello_reaches_through_the_whole_tree() {
        let (app, outbound) = app();
        app.dispatch(message(1, ADMIN, "/say_hello"));
        settle().await;
        assert_eq!(outbound.reply_texts(), vec!["Hello, 10!"]);
    }

    #[tokio::test]
    async fn shutdown_vetoes_features_until_boot() {
        let (app, outbound) = app();

        app.dispatch(message(1, ADMIN, "/shutdown"));
        settle().await;
        app.dispatch(message(2, ADMIN, "/say_hello"));
        settle().await;
        // Only the shutdown acknowledgement went out; the greeting was vetoed.
        assert_eq!(outbound.reply_texts().len(), 1);

        app.dispatch(message(3, ADMIN, "/boot"));
        settle().await;
        app.dispatch(message(4, ADMIN, "/say_hello"));
        settle().await;
        assert_eq!(outbound.reply_texts().last().unwrap(), "Hello, 10!");
    }

    #[tokio::test]
    async fn chat_command_flows_to_the_completion_worker() {
        let (app, outbound) = app();
        app.dispatch(message(1, ADMIN, "/chat hello there"));

        for _ in 0..200 {
            if outbound.edit_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(outbound.last_edit_text().as_deref(), Some("a canned answer"));
    }

    #[tokio::test]
    async fn no_sticker_mode_deletes_stickers() {
        let (app, outbound) = app();

        app.dispatch(message(1, ADMIN, "/no_sticker"));
        settle().await;

        let sticker = Event::builder(CHAT, UserId(11), MessageId(2)).sticker().build();
        app.dispatch(sticker);
        settle().await;
        assert_eq!(outbound.delete_count(), 1);
    }
}
