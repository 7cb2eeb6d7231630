//! # Braze Core
//!
//! The event model and module composition engine of the braze chat core.
//!
//! Inbound chat events are routed once through a static tree of
//! predicate-guarded handlers. The tree is assembled at startup from the
//! combinators in [`framework::module`] and is immutable afterwards; every
//! event is dispatched as an independent concurrent task.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Event model**: one normalized inbound message ([`Event`], id
//!   newtypes, [`Command`] parsing)
//! - **Context**: the per-leg [`ModuleContext`] with namespaced children
//! - **Outbound**: the send/edit/delete collaborator ([`Outbound`])
//!
//! ### Framework Layer
//!
//! - **Predicates**: an introspectable combinator tree ([`Predicate`])
//! - **Modules**: composable handlers and the combinators that arrange
//!   them ([`Module`], `sequential`, `parallel`, `isolated_chat`, ...)
//! - **Dispatcher**: fire-and-forget per-event routing ([`Dispatcher`])
//!
//! ```text
//! EventSource ──▶ Dispatcher ──▶ sequential([gates..., parallel([features...])])
//! ```

pub mod foundation;
pub mod framework;

pub use foundation::{
    ChatId, ChatKind, Command, Event, EventBuilder, MessageId, ModuleContext, Outbound,
    OutboundCall, OutboundError, OutboundResult, RecordingOutbound, ReplyTo, UserId,
};
pub use framework::{BoxedModule, Dispatcher, HandleResult, Module, Predicate};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::foundation::*;
    pub use crate::framework::module::*;
    pub use crate::framework::{Dispatcher, Predicate};
}
