//! Handler registry — subtype to handler mapping with startup checks
//!
//! Built once at startup, then shared read-only. Two handlers claiming
//! the same kind is a configuration error and fails registration
//! immediately instead of silently shadowing the later handler.

use crate::error::{RelayError, Result};
use crate::event::{DomainEvent, EventKind};
use crate::handler::EventHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of handlers for one event category
pub struct HandlerRegistry<E: DomainEvent> {
    handlers: Vec<Arc<dyn EventHandler<E>>>,
    by_kind: HashMap<E::Kind, usize>,
}

impl<E: DomainEvent> HandlerRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            by_kind: HashMap::new(),
        }
    }

    /// Register a handler for every kind it claims via `supports`
    ///
    /// Fails with [`RelayError::HandlerConflict`] when a claimed kind is
    /// already taken; the registry is left unchanged in that case.
    pub fn register(&mut self, handler: Arc<dyn EventHandler<E>>) -> Result<()> {
        let claimed: Vec<E::Kind> = E::Kind::ALL
            .iter()
            .copied()
            .filter(|kind| handler.supports(*kind))
            .collect();

        for kind in &claimed {
            if let Some(&index) = self.by_kind.get(kind) {
                return Err(RelayError::HandlerConflict {
                    kind: kind.to_string(),
                    handler: handler.name().to_string(),
                    registered: self.handlers[index].name().to_string(),
                });
            }
        }

        let index = self.handlers.len();
        for kind in &claimed {
            self.by_kind.insert(*kind, index);
        }
        tracing::debug!(
            handler = %handler.name(),
            kinds = ?claimed.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "Handler registered"
        );
        self.handlers.push(handler);
        Ok(())
    }

    /// Look up the handler for a kind
    pub fn resolve(&self, kind: E::Kind) -> Option<&Arc<dyn EventHandler<E>>> {
        self.by_kind.get(&kind).map(|&index| &self.handlers[index])
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Kinds of this category no registered handler claims
    ///
    /// Events of these kinds will be logged and acknowledged without
    /// processing; useful as a startup sanity report.
    pub fn uncovered_kinds(&self) -> Vec<E::Kind> {
        E::Kind::ALL
            .iter()
            .copied()
            .filter(|kind| !self.by_kind.contains_key(kind))
            .collect()
    }
}

impl<E: DomainEvent> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DomainEvent> std::fmt::Debug for HandlerRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .field("kinds", &self.by_kind.len())
            .finish()
    }
}
