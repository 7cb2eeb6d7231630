//! The completion API collaborator.
//!
//! The external completion service is consumed through [`CompletionApi`]:
//! a synchronous call returning one text, and a streaming call returning an
//! incremental fragment sequence that ends with the stream itself or with
//! an error item. The wire protocol behind the trait is out of scope.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Errors surfaced by the completion collaborator.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The backend rejected or failed the request.
    #[error("completion request failed: {0}")]
    Api(String),

    /// The stream broke before its end marker.
    #[error("completion stream interrupted: {0}")]
    Interrupted(String),
}

/// Result type for completion operations.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// An incremental fragment sequence. Ends with the stream, or earlier with
/// an error item.
pub type FragmentStream = BoxStream<'static, CompletionResult<String>>;

/// Access to the slow external completion service.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Requests one full completion for the given turns.
    async fn complete(&self, turns: &[Turn]) -> CompletionResult<String>;

    /// Requests a streamed completion for the given turns.
    async fn complete_stream(&self, turns: &[Turn]) -> CompletionResult<FragmentStream>;
}
