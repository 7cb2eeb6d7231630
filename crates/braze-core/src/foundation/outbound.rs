//! The outbound send/edit/delete collaborator.
//!
//! Everything the core says back to the chat platform goes through the
//! [`Outbound`] trait: replies, placeholder edits, and message deletion.
//! Messages are addressed purely by chat and message identifiers.
//!
//! Outbound failures are never escalated past the calling leg. The helpers
//! here encode the two tolerances the core relies on:
//!
//! - an edit that changes nothing may be rejected by the platform with a
//!   "no-op" error ([`OutboundError::NotModified`]), which callers treat as
//!   success;
//! - deletes are best effort, logged on failure and otherwise ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

use super::event::{ChatId, MessageId};

/// Errors surfaced by the outbound collaborator.
#[derive(Debug, Clone, Error)]
pub enum OutboundError {
    /// The platform rejected an edit because the content did not change.
    /// Callers treat this as success.
    #[error("edit rejected: message not modified")]
    NotModified,

    /// The platform rejected the request.
    #[error("outbound request rejected: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("outbound transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type for outbound operations.
pub type OutboundResult<T> = Result<T, OutboundError>;

/// Send/edit/delete access to the chat platform.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Sends a reply to `reply_to` in `chat`, returning the new message id.
    async fn send_reply(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> OutboundResult<MessageId>;

    /// Replaces the text of an already-sent message.
    async fn edit(&self, chat: ChatId, message: MessageId, text: &str) -> OutboundResult<()>;

    /// Deletes a message.
    async fn delete(&self, chat: ChatId, message: MessageId) -> OutboundResult<()>;
}

/// Edits a message, treating a no-op rejection as success.
pub async fn edit_tolerant(
    outbound: &dyn Outbound,
    chat: ChatId,
    message: MessageId,
    text: &str,
) -> OutboundResult<()> {
    match outbound.edit(chat, message, text).await {
        Err(OutboundError::NotModified) => Ok(()),
        other => other,
    }
}

/// Deletes a message best effort; a failure is logged, never raised.
pub async fn delete_best_effort(outbound: &dyn Outbound, chat: ChatId, message: MessageId) {
    if let Err(err) = outbound.delete(chat, message).await {
        warn!(%chat, %message, error = %err, "failed to delete message");
    }
}

/// Sends a reply best effort; a failure is logged, never raised.
pub async fn reply_best_effort(
    outbound: &dyn Outbound,
    chat: ChatId,
    reply_to: MessageId,
    text: &str,
) {
    if let Err(err) = outbound.send_reply(chat, reply_to, text).await {
        warn!(%chat, %reply_to, error = %err, "failed to send reply");
    }
}

// ============================================================================
// RecordingOutbound: in-memory implementation
// ============================================================================

/// One call observed by [`RecordingOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    Reply {
        chat: ChatId,
        reply_to: MessageId,
        text: String,
    },
    Edit {
        chat: ChatId,
        message: MessageId,
        text: String,
    },
    Delete {
        chat: ChatId,
        message: MessageId,
    },
}

/// An in-memory [`Outbound`] that records every call.
///
/// Used as the test double throughout the workspace and handy for dry runs:
/// sends succeed with monotonically increasing message ids, edits and
/// deletes always succeed.
#[derive(Default)]
pub struct RecordingOutbound {
    calls: Mutex<Vec<OutboundCall>>,
    next_id: AtomicI64,
}

impl RecordingOutbound {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1000),
        })
    }

    /// Returns a snapshot of every call made so far.
    pub fn calls(&self) -> Vec<OutboundCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of edit calls made so far.
    pub fn edit_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, OutboundCall::Edit { .. }))
            .count()
    }

    /// Returns the number of delete calls made so far.
    pub fn delete_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, OutboundCall::Delete { .. }))
            .count()
    }

    /// Returns the texts of all replies sent so far.
    pub fn reply_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                OutboundCall::Reply { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the text of the most recent edit, if any.
    pub fn last_edit_text(&self) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            OutboundCall::Edit { text, .. } => Some(text.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_reply(
        &self,
        chat: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> OutboundResult<MessageId> {
        self.calls.lock().push(OutboundCall::Reply {
            chat,
            reply_to,
            text: text.to_string(),
        });
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit(&self, chat: ChatId, message: MessageId, text: &str) -> OutboundResult<()> {
        self.calls.lock().push(OutboundCall::Edit {
            chat,
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, chat: ChatId, message: MessageId) -> OutboundResult<()> {
        self.calls.lock().push(OutboundCall::Delete { chat, message });
        Ok(())
    }
}
