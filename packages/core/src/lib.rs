//! Notegrove Core - Hierarchical CRUD with Optimistic Concurrency
//!
//! This crate manages the in-memory tree of a note-taking workspace
//! (folders containing folders and notes) and lets a UI mutate it with
//! immediate feedback: every create, rename, delete, move, and reorder is
//! applied to the displayed tree before the backing store confirms it, then
//! reconciled with the authoritative result or rolled back on failure.
//! Tree invariants (unique ids, acyclic parent chains, stable sibling
//! ordering) hold at all times.
//!
//! # Modules
//!
//! - [`models`] - `EntityId`, the `TreeEntity` trait, `Folder` and `Note`
//! - [`tree`] - pure forest manipulation, ordering policy, cycle guard
//! - [`engine`] - optimistic action log and the `CrudEngine`
//! - [`store`] - backing-store adapter trait, row mapping, in-memory store

pub mod engine;
pub mod models;
pub mod store;
pub mod tree;

// Re-export commonly used types
pub use engine::{CrudEngine, EngineConfig, EngineError, Operation};
pub use models::{EntityId, Folder, FolderPatch, Note, NotePatch, TreeEntity};
pub use store::{EntityStore, FromRow, MappingError, MemoryStore, Row};
