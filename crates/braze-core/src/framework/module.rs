//! The module composition engine.
//!
//! A [`Module`] is a composable event handler. Independently authored
//! handlers are assembled at startup into a fixed tree of combinators, and
//! every inbound event traverses that tree exactly once:
//!
//! - [`sequential`] runs children in order and stops the moment one returns
//!   [`HandleResult::NoMore`]; this is how moderation gates veto everything
//!   downstream;
//! - [`parallel`] spawns every child independently; a panic in one leg is
//!   caught and logged without disturbing siblings, and the group always
//!   reports [`HandleResult::NextOfChain`];
//! - [`with_predicate`] / [`stateless`] gate a unit behind a [`Predicate`];
//!   when the predicate fails the unit is not invoked at all;
//! - [`shared_context`] hands the identical sub-context instance to every
//!   group member for one event;
//! - [`isolated_chat`] lazily builds a dedicated module instance per chat,
//!   with an atomic get-or-create so the factory runs at most once per chat
//!   id even under concurrent first arrival;
//! - [`named`] and [`deferred`] attach metadata: a diagnostic identity, and
//!   a marker that makes the enclosing composition run the leg after all
//!   non-deferred siblings.
//!
//! The chat registry kept by [`isolated_chat`] grows monotonically; there is
//! no eviction.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::foundation::context::ModuleContext;
use crate::foundation::event::{ChatId, Event};
use crate::framework::predicate::Predicate;

/// What a module tells the enclosing composition after handling an event.
///
/// Only [`sequential`] consults the value; everywhere else it is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleResult {
    /// Later siblings in a sequential chain still run.
    NextOfChain,
    /// Later siblings in a sequential chain are skipped for this event.
    NoMore,
}

/// A composable event handler.
#[async_trait]
pub trait Module: Send + Sync {
    /// Handles one event.
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult;

    /// Diagnostic name, set by [`named`].
    fn name(&self) -> Option<&str> {
        None
    }

    /// Whether this leg runs after all non-deferred siblings.
    fn is_deferred(&self) -> bool {
        false
    }
}

/// A shared, type-erased module.
pub type BoxedModule = Arc<dyn Module>;

// ============================================================================
// Function modules
// ============================================================================

struct FnModule<F> {
    f: F,
}

#[async_trait]
impl<F> Module for FnModule<F>
where
    F: Fn(Arc<ModuleContext>, Arc<Event>) -> BoxFuture<'static, HandleResult> + Send + Sync,
{
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        (self.f)(ctx, event).await
    }
}

/// Wraps an async function into a module.
///
/// ```rust,ignore
/// let echo = from_fn(|ctx, event| Box::pin(async move {
///     reply_best_effort(ctx.outbound().as_ref(), event.chat, event.message_id, &event.text).await;
///     HandleResult::NextOfChain
/// }));
/// ```
pub fn from_fn<F>(f: F) -> BoxedModule
where
    F: Fn(Arc<ModuleContext>, Arc<Event>) -> BoxFuture<'static, HandleResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnModule { f })
}

/// Wraps an async function behind a predicate.
///
/// The function is only invoked when the predicate holds, and the resulting
/// module always reports [`HandleResult::NextOfChain`]. Use this for tiny
/// handlers whose state fits in the closure.
pub fn stateless<F>(f: F, predicate: Predicate) -> BoxedModule
where
    F: Fn(Arc<ModuleContext>, Arc<Event>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    with_predicate(
        from_fn(move |ctx, event| {
            let fut = f(ctx, event);
            Box::pin(async move {
                fut.await;
                HandleResult::NextOfChain
            })
        }),
        predicate,
    )
}

// ============================================================================
// Predicate gating
// ============================================================================

struct Predicated {
    inner: BoxedModule,
    predicate: Predicate,
}

#[async_trait]
impl Module for Predicated {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        if self.predicate.test(&event) {
            self.inner.handle_update(ctx, event).await;
        }
        HandleResult::NextOfChain
    }

    fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    fn is_deferred(&self) -> bool {
        self.inner.is_deferred()
    }
}

/// Gates a module behind a predicate.
///
/// When the predicate fails the wrapped module is not invoked, so no side
/// effects happen. The wrapper always reports [`HandleResult::NextOfChain`].
pub fn with_predicate(module: BoxedModule, predicate: Predicate) -> BoxedModule {
    Arc::new(Predicated {
        inner: module,
        predicate,
    })
}

// ============================================================================
// Sequential
// ============================================================================

struct Sequential {
    children: Vec<BoxedModule>,
}

#[async_trait]
impl Module for Sequential {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        for child in &self.children {
            let result = child
                .handle_update(Arc::clone(&ctx), Arc::clone(&event))
                .await;
            if result == HandleResult::NoMore {
                trace!(
                    module = child.name().unwrap_or("unnamed"),
                    "chain vetoed, skipping remaining modules"
                );
                return HandleResult::NoMore;
            }
        }
        HandleResult::NextOfChain
    }
}

/// Runs children strictly in order, stopping at the first
/// [`HandleResult::NoMore`]. Deferred children are stably moved to the end.
pub fn sequential(children: Vec<BoxedModule>) -> BoxedModule {
    Arc::new(Sequential {
        children: partition_deferred_last(children),
    })
}

// ============================================================================
// Parallel
// ============================================================================

struct Parallel {
    /// Non-deferred children, spawned as one wave.
    wave: Vec<BoxedModule>,
    /// Deferred children, spawned after the first wave completes.
    deferred: Vec<BoxedModule>,
}

impl Parallel {
    async fn run_wave(children: &[BoxedModule], ctx: &Arc<ModuleContext>, event: &Arc<Event>) {
        let tasks: Vec<_> = children
            .iter()
            .map(|child| {
                let child = Arc::clone(child);
                let ctx = Arc::clone(ctx);
                let event = Arc::clone(event);
                tokio::spawn(async move {
                    child.handle_update(ctx, event).await;
                })
            })
            .collect();

        for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
            if let Err(err) = joined {
                // One leg failing must not take its siblings down with it.
                error!(
                    module = children[index].name().unwrap_or("unnamed"),
                    panicked = err.is_panic(),
                    "parallel leg failed"
                );
            }
        }
    }
}

#[async_trait]
impl Module for Parallel {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        Self::run_wave(&self.wave, &ctx, &event).await;
        if !self.deferred.is_empty() {
            Self::run_wave(&self.deferred, &ctx, &event).await;
        }
        HandleResult::NextOfChain
    }
}

/// Runs every child independently for the event.
///
/// Children are spawned as separate tasks with no ordering guarantee between
/// them; return values are ignored and the group always reports
/// [`HandleResult::NextOfChain`]. Deferred children run as a second wave
/// after the first completes.
pub fn parallel(children: Vec<BoxedModule>) -> BoxedModule {
    let (wave, deferred) = children.into_iter().partition(|m| !m.is_deferred());
    Arc::new(Parallel { wave, deferred })
}

// ============================================================================
// Shared context
// ============================================================================

struct SharedGroup {
    children: Vec<BoxedModule>,
}

#[async_trait]
impl Module for SharedGroup {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        // One sub-context per event, the identical instance for every child.
        let shared = Arc::new(ctx.sub("shared"));
        for child in &self.children {
            child
                .handle_update(Arc::clone(&shared), Arc::clone(&event))
                .await;
        }
        HandleResult::NextOfChain
    }
}

/// Hands every child the identical sub-context instance for each event,
/// enabling cooperative state sharing. Adds no filtering of its own.
pub fn shared_context(children: Vec<BoxedModule>) -> BoxedModule {
    Arc::new(SharedGroup {
        children: partition_deferred_last(children),
    })
}

// ============================================================================
// Isolated chat
// ============================================================================

/// Builds the per-chat module instance on first qualifying event.
pub type ChatModuleFactory = Arc<dyn Fn(&Event) -> BoxedModule + Send + Sync>;

#[derive(Clone)]
struct ChatSlot {
    module: BoxedModule,
    ctx: Arc<ModuleContext>,
}

struct IsolatedChat {
    factory: ChatModuleFactory,
    register_when: Option<Predicate>,
    slots: Mutex<HashMap<ChatId, ChatSlot>>,
}

#[async_trait]
impl Module for IsolatedChat {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        let slot = {
            let mut slots = self.slots.lock();
            match slots.entry(event.chat) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    if let Some(predicate) = &self.register_when {
                        if !predicate.test(&event) {
                            // The leg stays a no-op for this chat until a
                            // later event satisfies the predicate.
                            return HandleResult::NextOfChain;
                        }
                    }
                    trace!(chat = %event.chat, "registering chat module");
                    let module = (self.factory)(&event);
                    let sub = Arc::new(ctx.sub(&event.chat.to_string()));
                    entry
                        .insert(ChatSlot { module, ctx: sub })
                        .clone()
                }
            }
        };
        slot.module.handle_update(slot.ctx, event).await
    }
}

/// Per-chat isolation: on first event from a chat, `factory` builds a
/// dedicated module instance which is stored and reused for every later
/// event from that chat. The get-or-create is atomic per chat id: the
/// factory is invoked at most once per chat even when two first-arrival
/// events race. The inner module's result propagates.
pub fn isolated_chat<F>(factory: F) -> BoxedModule
where
    F: Fn(&Event) -> BoxedModule + Send + Sync + 'static,
{
    Arc::new(IsolatedChat {
        factory: Arc::new(factory),
        register_when: None,
        slots: Mutex::new(HashMap::new()),
    })
}

/// Like [`isolated_chat`], but the factory only runs once `predicate`
/// accepts an event from the not-yet-registered chat.
pub fn isolated_chat_when<F>(factory: F, predicate: Predicate) -> BoxedModule
where
    F: Fn(&Event) -> BoxedModule + Send + Sync + 'static,
{
    Arc::new(IsolatedChat {
        factory: Arc::new(factory),
        register_when: Some(predicate),
        slots: Mutex::new(HashMap::new()),
    })
}

// ============================================================================
// Metadata wrappers
// ============================================================================

struct Named {
    name: String,
    inner: BoxedModule,
}

#[async_trait]
impl Module for Named {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        trace!(module = %self.name, "handling event");
        self.inner.handle_update(ctx, event).await
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn is_deferred(&self) -> bool {
        self.inner.is_deferred()
    }
}

/// Identity wrapper carrying a diagnostic name.
pub fn named(name: impl Into<String>, module: BoxedModule) -> BoxedModule {
    Arc::new(Named {
        name: name.into(),
        inner: module,
    })
}

struct Deferred {
    inner: BoxedModule,
}

#[async_trait]
impl Module for Deferred {
    async fn handle_update(&self, ctx: Arc<ModuleContext>, event: Arc<Event>) -> HandleResult {
        self.inner.handle_update(ctx, event).await
    }

    fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    fn is_deferred(&self) -> bool {
        true
    }
}

/// Marks a leg to run after all non-deferred siblings in the enclosing
/// composition, so lazily-registered subsystems observe the event only
/// after higher-priority gates have already run.
pub fn deferred(module: BoxedModule) -> BoxedModule {
    Arc::new(Deferred { inner: module })
}

fn partition_deferred_last(children: Vec<BoxedModule>) -> Vec<BoxedModule> {
    let (mut ordered, trailing): (Vec<_>, Vec<_>) =
        children.into_iter().partition(|m| !m.is_deferred());
    ordered.extend(trailing);
    ordered
}
