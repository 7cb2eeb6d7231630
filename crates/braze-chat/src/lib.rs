//! Bounded async completion worker.
//!
//! Bridges chat commands to a slow external completion service without ever
//! blocking the handler tree:
//!
//! - [`api`]: the completion collaborator trait, turns, and fragment streams;
//! - [`history`]: anchor-keyed conversation context over the KV store;
//! - [`service`]: the admission queue and the per-task workers;
//! - [`module`]: the `/chat` and `/chat_stream` handler;
//! - [`settings`]: tunables for all of the above.

pub mod api;
pub mod history;
pub mod module;
pub mod service;
pub mod settings;

mod stream;

pub use api::{CompletionApi, CompletionError, CompletionResult, FragmentStream, Role, Turn};
pub use history::History;
pub use module::ChatModule;
pub use service::{ChatConsumer, ChatService, ChatTask, DeliveryMode};
pub use settings::ChatSettings;
