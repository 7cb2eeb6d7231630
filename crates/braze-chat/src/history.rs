//! Conversation context, keyed by (chat, anchor message).
//!
//! After a successful completion the whole exchange is persisted under the
//! bot's reply message id. When a later `/chat` replies to that message,
//! the prior turns are fetched and prepended, truncated to the most recent
//! `2 × keep_context` entries.
//!
//! Store and serialization failures degrade to "no context": logged,
//! never raised.

use std::sync::Arc;

use braze_core::{ChatId, MessageId};
use braze_store::{keys, KvStore};
use tracing::error;

use crate::api::Turn;

const CONTEXT_KEY: &str = "chat_context";

/// Anchor-keyed conversation history over the KV collaborator.
#[derive(Clone)]
pub struct History {
    store: Arc<dyn KvStore>,
    prefix: String,
    keep_context: usize,
}

impl History {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, keep_context: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            keep_context,
        }
    }

    /// How many exchanges are kept; `0` disables context entirely.
    pub fn keep_context(&self) -> usize {
        self.keep_context
    }

    fn key(&self, chat: ChatId, anchor: MessageId) -> String {
        keys::chat(&self.prefix, &format!("{CONTEXT_KEY}:m{anchor}"), chat)
    }

    /// Loads prior turns for `anchor`, truncated to the most recent
    /// `2 × keep_context`.
    pub async fn load(&self, chat: ChatId, anchor: MessageId) -> Vec<Turn> {
        let key = self.key(chat, anchor);
        let raw = match self.store.get_raw(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!(key, error = %err, "context read failed, continuing without");
                return Vec::new();
            }
        };
        let mut turns: Vec<Turn> = match serde_json::from_str(&raw) {
            Ok(turns) => turns,
            Err(err) => {
                error!(key, error = %err, "stored context is malformed, discarding");
                return Vec::new();
            }
        };
        let cap = 2 * self.keep_context;
        if turns.len() > cap {
            turns.drain(..turns.len() - cap);
        }
        turns
    }

    /// Persists the exchange under the reply message id.
    pub async fn save(&self, chat: ChatId, message: MessageId, turns: &[Turn]) {
        let key = self.key(chat, message);
        let raw = match serde_json::to_string(turns) {
            Ok(raw) => raw,
            Err(err) => {
                error!(key, error = %err, "context serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.set_raw(&key, &raw, None).await {
            error!(key, error = %err, "context write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braze_store::MemoryStore;

    const CHAT: ChatId = ChatId(1);
    const ANCHOR: MessageId = MessageId(100);

    fn exchange(n: usize) -> Vec<Turn> {
        (0..n)
            .flat_map(|i| [Turn::user(format!("q{i}")), Turn::assistant(format!("a{i}"))])
            .collect()
    }

    #[tokio::test]
    async fn round_trips_turns() {
        let history = History::new(MemoryStore::new(), "test", 3);
        let turns = exchange(2);
        history.save(CHAT, ANCHOR, &turns).await;
        assert_eq!(history.load(CHAT, ANCHOR).await, turns);
    }

    #[tokio::test]
    async fn load_keeps_only_the_most_recent_turns() {
        let history = History::new(MemoryStore::new(), "test", 2);
        history.save(CHAT, ANCHOR, &exchange(5)).await;

        let loaded = history.load(CHAT, ANCHOR).await;
        assert_eq!(loaded.len(), 4);
        // The oldest exchanges are dropped, the tail survives intact.
        assert_eq!(loaded[0], Turn::user("q3"));
        assert_eq!(loaded[3], Turn::assistant("a4"));
    }

    #[tokio::test]
    async fn missing_anchor_means_no_context() {
        let history = History::new(MemoryStore::new(), "test", 2);
        assert!(history.load(CHAT, ANCHOR).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_context_is_discarded() {
        let store = MemoryStore::new();
        let history = History::new(store.clone(), "test", 2);
        let key = keys::chat("test", &format!("{CONTEXT_KEY}:m{ANCHOR}"), CHAT);
        store.set_raw(&key, "not json", None).await.unwrap();
        assert!(history.load(CHAT, ANCHOR).await.is_empty());
    }
}
