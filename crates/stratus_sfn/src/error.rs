//! Errors raised while building, validating, or serializing a workflow.

use stratus_core::{CoreError, StateId};

/// Result type for workflow operations
pub type BuildResult<T> = Result<T, BuildError>;

/// Workflow build error
///
/// Every variant that concerns a state carries its name so the author of the
/// configuration can find the call that created it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The graph was wired in a structurally invalid way
    #[error("Invalid \"{state}\" state: {reason}")]
    Construction {
        /// Offending state name
        state: String,
        /// What was wrong
        reason: String,
    },

    /// Two distinct states share a name
    #[error("Multiple states with the same name \"{name}\". State names must be unique.")]
    DuplicateName {
        /// Shared name
        name: String,
    },

    /// One state is reachable from two graph contexts
    #[error(
        "Cannot reuse the \"{name}\" state. States cannot be reused in Map or Parallel branches."
    )]
    StateReuse {
        /// Reused state name
        name: String,
    },

    /// A handle that this workflow never issued
    #[error("Unknown state {id}")]
    UnknownState {
        /// Unknown handle
        id: StateId,
    },

    /// Composed graph is larger than allowed
    #[error("State machine has {count} states, exceeding the configured maximum of {max}")]
    Limit {
        /// States in the composed graph
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// Machine configuration is invalid
    #[error("Invalid machine configuration: {0}")]
    Config(String),

    /// Core value error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BuildError {
    /// Shorthand for [`BuildError::Construction`]
    pub(crate) fn construction(state: &str, reason: impl Into<String>) -> Self {
        Self::Construction {
            state: state.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        Self::Core(CoreError::from(err))
    }
}
