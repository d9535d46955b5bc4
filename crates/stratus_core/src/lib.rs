//! Stratus Core Types
//!
//! This crate contains pure value types with no I/O: identifiers,
//! durations, dynamic expressions, and access-policy statements.
//! Everything here is shared by the state-machine builder and by the
//! resource components that consume its output.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod expr;
pub mod id;
pub mod permission;
pub mod time;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use expr::{is_jsonata, Dynamic, Jsonata};
pub use id::{GraphContext, StateId};
pub use permission::Permission;
pub use time::Duration;
