//! Foundation layer - event model, per-leg context, outbound collaborator.

pub mod context;
pub mod event;
pub mod outbound;

pub use context::ModuleContext;
pub use event::{ChatId, ChatKind, Command, Event, EventBuilder, MessageId, ReplyTo, UserId};
pub use outbound::{
    delete_best_effort, edit_tolerant, reply_best_effort, Outbound, OutboundCall, OutboundError,
    OutboundResult, RecordingOutbound,
};
