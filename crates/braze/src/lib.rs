//! # Braze
//!
//! A modular, moderated, completion-backed chat-bot core.
//!
//! ## Overview
//!
//! Braze routes every inbound chat event once through a static tree of
//! predicate-guarded handler modules, assembled at startup:
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌───────────────────────────────────┐
//! │ EventSource │────▶│ Dispatcher │────▶│ sequential([ gates..., parallel([ │
//! │  (adapter)  │     │ (per-event │     │   features..., moderation...,     │
//! └─────────────┘     │   task)    │     │   deferred(chat) ]) ])            │
//!                     └────────────┘     └───────────────────────────────────┘
//! ```
//!
//! - **braze-core**: the event model and module composition engine
//! - **braze-store**: the KV-with-TTL collaborator and in-memory reference
//! - **braze-guard**: moderation flags, ban commands, gates, rate limiting
//! - **braze-chat**: the bounded async completion worker
//! - **braze-runtime**: config, logging, features, application assembly
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use braze::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BrazeConfig::load().expect("configuration");
//!     let _log = braze::runtime::logging::init(&config.logging);
//!
//!     let app = App::start(&config, AppDeps {
//!         store: my_store(),
//!         outbound: my_outbound(),
//!         completion: my_completion_api(),
//!     });
//!     app.run(my_event_source()).await;
//! }
//! ```

pub use braze_chat as chat;
pub use braze_core as core;
pub use braze_guard as guard;
pub use braze_runtime as runtime;
pub use braze_store as store;

/// Prelude for common imports.
pub mod prelude {
    pub use braze_chat::{ChatService, ChatSettings, CompletionApi, Turn};
    pub use braze_core::prelude::*;
    pub use braze_guard::{BanOutcome, Moderation};
    pub use braze_runtime::{App, AppDeps, BrazeConfig};
    pub use braze_store::{KvStore, MemoryStore};
}
