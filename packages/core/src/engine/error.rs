//! Engine Error Types
//!
//! Structural rejections (cycles) are typed separately from backing-store
//! failures so callers can distinguish "nothing was applied" from "applied
//! optimistically, then rolled back". Validation rejections and not-found
//! targets are not errors at all; those paths resolve as silent no-ops.

use std::fmt;
use thiserror::Error;

/// The mutating operation an engine call performs; carried in errors and
/// passed to the success/error hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Move,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Move => "move",
        };
        write!(f, "{}", name)
    }
}

/// Errors surfaced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A reparent would make a node its own ancestor. Rejected before any
    /// optimistic mutation, so no rollback is involved.
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// The referenced parent is itself an unconfirmed optimistic creation;
    /// it has no durable id yet, so nothing can be placed under it until it
    /// settles. Rejected before any optimistic mutation or store call.
    #[error("Unconfirmed parent: {context}")]
    UnconfirmedParent { context: String },

    /// The backing-store call failed. The optimistic layer has already been
    /// unwound by the time this error reaches the caller.
    #[error("Store {operation} failed: {source}")]
    StoreFailed {
        operation: Operation,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create an unconfirmed parent error
    pub fn unconfirmed_parent(context: impl Into<String>) -> Self {
        Self::UnconfirmedParent {
            context: context.into(),
        }
    }

    /// Create a store failure error
    pub fn store_failed(operation: Operation, source: anyhow::Error) -> Self {
        Self::StoreFailed { operation, source }
    }
}
