//! # Handler Registry
//!
//! Maps a type name to its `Handler`.
//!
//! Backed by a `DashMap`, so lookups on the hot path never wait on a global lock
//! and registrations from different tasks may interleave freely. The last
//! registration for a name wins.

use std::sync::Arc;

use dashmap::DashMap;

use crate::handler::Handler;

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handler` under its type name, returning the one it replaced.
    pub fn register(&self, handler: Handler) -> Option<Arc<Handler>> {
        let name = handler.target_type().to_string();
        tracing::debug!(target_type = %name, bound = handler.instance().is_some(), "handler registered");
        self.handlers.insert(name, Arc::new(handler))
    }

    pub fn unregister(&self, target_type: &str) -> Option<Arc<Handler>> {
        let removed = self.handlers.remove(target_type).map(|(_, handler)| handler);
        if removed.is_some() {
            tracing::debug!(target_type, "handler unregistered");
        }
        removed
    }

    pub fn find(&self, target_type: &str) -> Option<Arc<Handler>> {
        self.handlers.get(target_type).map(|entry| entry.value().clone())
    }

    pub fn has_handler(&self, target_type: &str) -> bool {
        self.handlers.contains_key(target_type)
    }

    /// A snapshot of every registered handler, in no particular order.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }
}
