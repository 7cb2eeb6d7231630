//! Key namespacing.
//!
//! Moderation flags are keyed by kind plus chat (and user), under a
//! deployment prefix: `prefix:kind:c<chat>` and `prefix:kind:c<chat>:u<user>`.

use braze_core::{ChatId, UserId};

/// Wraps a bare key under the deployment prefix.
pub fn wrap(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}:{key}")
    }
}

/// Key for per-chat state.
pub fn chat(prefix: &str, key: &str, chat: ChatId) -> String {
    wrap(prefix, &format!("{key}:c{chat}"))
}

/// Key for per-chat-member state.
pub fn chat_member(prefix: &str, key: &str, chat: ChatId, user: UserId) -> String {
    wrap(prefix, &format!("{key}:c{chat}:u{user}"))
}
