//! Chat worker settings.

use std::time::Duration;

/// Tunables for the completion worker and the `/chat` commands.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Admission queue capacity; a full queue rejects immediately.
    pub queue_depth: usize,
    /// Cap on concurrently running completion workers. Admitted tasks past
    /// the cap wait in the queue.
    pub max_workers: usize,
    /// Exchanges of prior context prepended to a reply-anchored request.
    pub keep_context: usize,
    /// How often the streaming buffer is flushed into a placeholder edit.
    /// Keep this above the outbound edit-rate limit.
    pub flush_interval: Duration,
    /// Longest accepted prompt, in characters.
    pub prompt_limit: usize,
    /// Optional system turn prepended to every request.
    pub system_prompt: Option<String>,
    /// Placeholder reply sent while the completion runs.
    pub placeholder_text: String,
    /// Substituted when the completion comes back blank.
    pub fallback_text: String,
    /// Reply when the admission queue is full.
    pub busy_text: String,
    /// Reply to a bare `/chat` without a prompt.
    pub greeting_text: String,
    /// Reply when the prompt exceeds `prompt_limit`.
    pub too_long_text: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            queue_depth: 16,
            max_workers: 8,
            keep_context: 5,
            flush_interval: Duration::from_secs(2),
            prompt_limit: 1000,
            system_prompt: None,
            placeholder_text: "Thinking...".to_string(),
            fallback_text: "...I have nothing to say.".to_string(),
            busy_text: "Too many conversations in flight. Try again in a bit?".to_string(),
            greeting_text: "Hello! What can I answer for you?".to_string(),
            too_long_text: "That prompt is too long for me.".to_string(),
        }
    }
}
