//! Handler registry for looking up ecosystems by id.
//!
//! The [`HandlerRegistry`] is built once at startup and passed by reference
//! to the orchestrators. There is no process-wide handler table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::EcosystemHandler;
use crate::npm::NpmHandler;
use crate::{Error, Result};

/// Registry mapping ecosystem ids to their handlers.
///
/// # Example
///
/// ```ignore
/// let registry = HandlerRegistry::with_defaults();
/// let npm = registry.resolve("npm")?;
/// assert_eq!(npm.id(), "npm");
/// ```
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn EcosystemHandler>>,
    by_id: HashMap<&'static str, usize>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in handlers (npm).
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NpmHandler::new());
        registry
    }

    /// Register a handler under its [`id`](EcosystemHandler::id).
    ///
    /// A handler registered under an id that is already taken replaces the
    /// earlier one.
    pub fn register<H>(&mut self, handler: H)
    where
        H: EcosystemHandler + 'static,
    {
        let id = handler.id();
        let handler: Arc<dyn EcosystemHandler> = Arc::new(handler);
        if let Some(&index) = self.by_id.get(id) {
            self.handlers[index] = handler;
        } else {
            self.by_id.insert(id, self.handlers.len());
            self.handlers.push(handler);
        }
    }

    /// Look up the handler for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedEcosystem`] when no handler is registered.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn EcosystemHandler>> {
        self.by_id
            .get(id)
            .map(|&index| Arc::clone(&self.handlers[index]))
            .ok_or_else(|| {
                Error::unsupported_ecosystem(
                    id,
                    self.ids().into_iter().map(str::to_string).collect(),
                )
            })
    }

    /// Registered ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
