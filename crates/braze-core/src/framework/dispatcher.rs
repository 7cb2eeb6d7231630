//! Event dispatcher.
//!
//! The [`Dispatcher`] owns the assembled module tree and the root context.
//! Every inbound event becomes an independent fire-and-forget task: there is
//! no ordering guarantee across events, only the ordering [`sequential`]
//! imposes within one event's traversal. A panic inside one event's task is
//! caught and logged; it never terminates the process or affects other
//! events.
//!
//! [`sequential`]: crate::framework::module::sequential

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::foundation::context::ModuleContext;
use crate::foundation::event::Event;
use crate::foundation::outbound::Outbound;
use crate::framework::module::{BoxedModule, HandleResult};

/// Routes inbound events through the module tree.
pub struct Dispatcher {
    root: BoxedModule,
    ctx: Arc<ModuleContext>,
}

impl Dispatcher {
    /// Creates a dispatcher over an assembled tree.
    pub fn new(root: BoxedModule, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            root,
            ctx: Arc::new(ModuleContext::root(outbound)),
        }
    }

    /// Dispatches one event as an independent task.
    pub fn dispatch(&self, event: Event) {
        let root = Arc::clone(&self.root);
        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let chat = event.chat;
            let message = event.message_id;
            debug!(%chat, %message, "dispatching event");
            let outcome = AssertUnwindSafe(root.handle_update(ctx, Arc::new(event)))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!(%chat, %message, "event task panicked");
            }
        });
    }

    /// Dispatches one event on the caller's task and waits for the full
    /// traversal. Used by in-process callers and tests.
    pub async fn dispatch_and_wait(&self, event: Event) -> HandleResult {
        self.root
            .handle_update(Arc::clone(&self.ctx), Arc::new(event))
            .await
    }

    /// Drains an inbound event source until it closes.
    pub async fn run(&self, mut events: mpsc::Receiver<Event>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        debug!("event source closed, dispatcher stopping");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
