//! Per-leg module context.
//!
//! A [`ModuleContext`] is what a module receives next to the event itself:
//! the outbound handle and the namespace path of the leg it is running in.
//! The root context belongs to the dispatcher; combinators derive children
//! with [`ModuleContext::sub`]:
//!
//! - `shared_context` derives one child per event and hands the *identical*
//!   instance to every group member;
//! - `isolated_chat` derives one child per chat at registration time and
//!   reuses it for every later event from that chat.

use std::sync::Arc;

use super::outbound::Outbound;

/// Context handed to a module leg.
pub struct ModuleContext {
    path: String,
    outbound: Arc<dyn Outbound>,
}

impl ModuleContext {
    /// Creates the root context.
    pub fn root(outbound: Arc<dyn Outbound>) -> Self {
        Self {
            path: String::new(),
            outbound,
        }
    }

    /// Derives a child context under `name`.
    pub fn sub(&self, name: &str) -> Self {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.path)
        };
        Self {
            path,
            outbound: Arc::clone(&self.outbound),
        }
    }

    /// The namespace path of this leg, for diagnostics.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The outbound collaborator.
    pub fn outbound(&self) -> &Arc<dyn Outbound> {
        &self.outbound
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
