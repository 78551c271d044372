//! Optimistic CRUD Engine
//!
//! This module binds the pure tree functions to a backing-store adapter:
//!
//! - `actions` - the append-only optimistic action log
//! - `crud` - the `CrudEngine` with create/update/delete/move/reorder and
//!   the editing session
//! - `hierarchy` - parent/child-aware helpers for nesting entity kinds
//! - `config` - per-collection configuration (validation, hooks)
//! - `error` - typed engine errors
//!
//! Mutations apply to the displayed tree immediately, then reconcile with
//! the store's authoritative result or roll back on failure; callers never
//! observe a half-applied tree.

pub mod actions;
pub mod config;
pub mod crud;
pub mod error;
mod hierarchy;

pub use actions::{ActionLog, ActionToken, OptimisticAction};
pub use config::EngineConfig;
pub use crud::CrudEngine;
pub use error::{EngineError, Operation};
