//! Framework layer - predicates, module combinators, and the dispatcher.

pub mod dispatcher;
pub mod module;
pub mod predicate;

pub use dispatcher::Dispatcher;
pub use module::{
    deferred, from_fn, isolated_chat, isolated_chat_when, named, parallel, sequential,
    shared_context, stateless, with_predicate, BoxedModule, ChatModuleFactory, HandleResult,
    Module,
};
pub use predicate::Predicate;
