//! Identifiers for state-machine entities.
//!
//! IDs are plain integers handed out in creation order so that every
//! traversal, error message and test is reproducible across runs.

use serde::{Deserialize, Serialize};

/// State identifier - handle to one node of a workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(u32);

impl StateId {
    /// Create from raw value
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the identifier that follows this one
    #[must_use]
    pub const fn successor(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state_{}", self.0)
    }
}

/// Graph context identifier - the main chain or one specific child graph
///
/// Contexts are numbered top-down during a single validation pass: the main
/// chain is always [`GraphContext::MAIN`] and each child graph entered after
/// it takes the next number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphContext(u32);

impl GraphContext {
    /// The top-level chain
    pub const MAIN: Self = Self(0);

    /// Create from raw value
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Check if this is the main chain
    #[must_use]
    pub const fn is_main(&self) -> bool {
        self.0 == 0
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::MAIN
    }
}

impl std::fmt::Display for GraphContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "graph_{}", self.0)
        }
    }
}
