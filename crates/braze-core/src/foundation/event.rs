//! The inbound event model.
//!
//! An [`Event`] is one normalized inbound chat message, produced exactly once
//! per message by the external event source. It is immutable: the dispatcher
//! wraps it in an `Arc` and every module leg observes the same record.
//!
//! Command parsing happens once, when the event is built. A message whose
//! text starts with `/name` carries a [`Command`] with the name, the split
//! argument list, and the untouched argument tail (prompts must keep their
//! original spacing).

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Identifies a chat (group or private conversation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Identifies a user within the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Identifies a message within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of chat an event originated from.
///
/// Private chats are exempt from rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    Private,
    Group,
}

// ============================================================================
// Commands
// ============================================================================

/// A parsed bot command (`/name args...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// The command name, without the leading slash or a `@botname` suffix.
    pub name: String,
    /// Whitespace-split arguments. Quoted spans (`"a b"` or `'a b'`) form a
    /// single argument.
    pub args: Vec<String>,
    /// Everything after the command name, untrimmed except for the single
    /// separating space. Used where argument spacing matters (prompts).
    pub tail: String,
}

impl Command {
    /// Parses a command from message text.
    ///
    /// Returns `None` unless the text starts with `/` followed by at least
    /// one non-whitespace character.
    pub fn parse(text: &str) -> Option<Command> {
        let rest = text.strip_prefix('/')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let raw_name = parts.next().filter(|n| !n.is_empty())?;
        // "/ban@some_bot" addresses a specific bot; the suffix is not part
        // of the command name.
        let name = raw_name.split('@').next().unwrap_or(raw_name).to_string();
        if name.is_empty() {
            return None;
        }
        let tail = parts.next().unwrap_or("").to_string();
        let args = split_args(&tail);
        Some(Command { name, args, tail })
    }

    /// Returns the first argument, if any.
    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Splits an argument tail on whitespace, honoring single and double quotes.
fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match ch {
            '\'' | '"' if quote == Some(ch) => quote = None,
            '\'' | '"' if quote.is_none() => quote = Some(ch),
            c if c.is_whitespace() && quote.is_none() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

// ============================================================================
// Event
// ============================================================================

/// Reference to the message an event replies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
    /// The replied-to message, used as the conversation-context anchor.
    pub message_id: MessageId,
    /// The sender of the replied-to message, when the source provides it.
    /// Moderation commands resolve their target from this.
    pub user: Option<UserId>,
}

/// One normalized inbound message.
///
/// Events are produced by the external source, dispatched once, and never
/// mutated. Delivery is at-least-once; the core keeps no idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub chat: ChatId,
    pub chat_kind: ChatKind,
    pub user: UserId,
    pub message_id: MessageId,
    pub text: String,
    pub has_sticker: bool,
    pub command: Option<Command>,
    pub reply_to: Option<ReplyTo>,
}

impl Event {
    /// Starts building an event. Mostly useful for adapters and tests.
    pub fn builder(chat: ChatId, user: UserId, message_id: MessageId) -> EventBuilder {
        EventBuilder {
            event: Event {
                chat,
                chat_kind: ChatKind::Group,
                user,
                message_id,
                text: String::new(),
                has_sticker: false,
                command: None,
                reply_to: None,
            },
        }
    }

    /// Returns `true` if the event carries a command.
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }

    /// Returns the command name, if the event carries one.
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_ref().map(|c| c.name.as_str())
    }
}

/// Builder for [`Event`].
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Sets the message text and parses any leading command from it.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.event.text = text.into();
        self.event.command = Command::parse(&self.event.text);
        self
    }

    pub fn private(mut self) -> Self {
        self.event.chat_kind = ChatKind::Private;
        self
    }

    pub fn sticker(mut self) -> Self {
        self.event.has_sticker = true;
        self
    }

    pub fn reply_to(mut self, message_id: MessageId, user: Option<UserId>) -> Self {
        self.event.reply_to = Some(ReplyTo { message_id, user });
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_command() {
        let cmd = Command::parse("/ban 30 extra").unwrap();
        assert_eq!(cmd.name, "ban");
        assert_eq!(cmd.args, vec!["30", "extra"]);
        assert_eq!(cmd.tail, "30 extra");
    }

    #[test]
    fn parse_strips_bot_suffix() {
        let cmd = Command::parse("/boot@braze_bot").unwrap();
        assert_eq!(cmd.name, "boot");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn parse_rejects_non_commands() {
        assert!(Command::parse("hello there").is_none());
        assert!(Command::parse("/").is_none());
        assert!(Command::parse("").is_none());
    }

    #[test]
    fn quoted_arguments_stay_whole() {
        let cmd = Command::parse(r#"/quote "two words" three"#).unwrap();
        assert_eq!(cmd.args, vec!["two words", "three"]);
    }

    #[test]
    fn tail_preserves_spacing() {
        let cmd = Command::parse("/chat tell me  a story").unwrap();
        assert_eq!(cmd.tail, "tell me  a story");
    }

    #[test]
    fn builder_parses_command_from_text() {
        let event = Event::builder(ChatId(1), UserId(2), MessageId(3))
            .text("/say_hello")
            .build();
        assert_eq!(event.command_name(), Some("say_hello"));
        assert!(!event.has_sticker);
    }
}
