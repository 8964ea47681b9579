//! String Interning for Parameter Names
//!
//! Every uniform field and resource slot is keyed by an interned [`Name`]
//! rather than a string, so per-draw lookups compare small integers instead
//! of hashing strings. The registry is an explicitly owned object constructed
//! next to the device and handed (by clone, it is an `Arc` handle) to every
//! consumer — there is deliberately no process-wide interner.

use std::sync::Arc;

use lasso::ThreadedRodeo;

/// A compact integer identifier for an interned parameter name.
pub type Name = lasso::Spur;

/// An owned name-interning registry shared across the binding layer.
///
/// Cloning is cheap (a shared handle) and every clone resolves against the
/// same pool, so a [`Name`] obtained from any clone is valid on all of them.
#[derive(Debug, Clone)]
pub struct NameRegistry {
    rodeo: Arc<ThreadedRodeo>,
}

impl NameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rodeo: Arc::new(ThreadedRodeo::new()),
        }
    }

    /// Interns a string, returning its [`Name`]. Idempotent.
    #[inline]
    #[must_use]
    pub fn intern(&self, s: &str) -> Name {
        self.rodeo.get_or_intern(s)
    }

    /// Looks up an already-interned string without allocating.
    #[inline]
    #[must_use]
    pub fn get(&self, s: &str) -> Option<Name> {
        self.rodeo.get(s)
    }

    /// Resolves a [`Name`] back to its string.
    #[inline]
    #[must_use]
    pub fn resolve(&self, name: Name) -> &str {
        self.rodeo.resolve(&name)
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
