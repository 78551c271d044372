//! Backing-Store Abstraction Layer
//!
//! This module defines the `EntityStore` trait the CRUD engine persists
//! through. The engine is agnostic to the implementation: a remote SQL
//! backend, a local database, or the bundled in-memory store all satisfy
//! the same contract.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: every method is async; the engine suspends only at
//!    this boundary.
//! 2. **Ownership Semantics**: `create` takes the entity by value; the
//!    engine clones before calling when it needs to retain the optimistic
//!    copy.
//! 3. **Error Handling**: `anyhow::Result` for flexible error context;
//!    the engine wraps failures into its own typed error after rollback.
//! 4. **Optional move**: stores that cannot reparent advertise it via
//!    `supports_move`, and the engine's move operation degrades to a no-op.

mod memory;
mod row;

pub use memory::MemoryStore;
pub use row::{FromRow, MappingError, Row};

use crate::models::{EntityId, TreeEntity};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence adapter for one entity collection.
///
/// Implementations must be `Send + Sync`; the engine holds them behind an
/// `Arc` and may have calls for different entities in flight concurrently.
#[async_trait]
pub trait EntityStore<T: TreeEntity>: Send + Sync {
    /// Persist a new entity and return it with its durable id assigned.
    ///
    /// The entity passed in carries a temporary id; the returned id must
    /// come from the store's own id space, distinct from any temporary
    /// scheme, so the engine can swap the optimistic node for the real one.
    async fn create(&self, entity: T) -> Result<T>;

    /// Apply a partial patch and return the full post-mutation entity,
    /// including any server-computed fields such as `updated_at`.
    async fn update(&self, id: &EntityId, patch: T::Patch) -> Result<T>;

    /// Delete the entity with `id`.
    async fn delete(&self, id: &EntityId) -> Result<()>;

    /// Whether this store can reparent entities. When `false`, the engine's
    /// move operation resolves as a silent no-op without calling
    /// [`move_entity`](EntityStore::move_entity).
    fn supports_move(&self) -> bool {
        false
    }

    /// Reparent the entity under `target_id` (root when `None`) at
    /// `position`, returning the full post-mutation entity.
    async fn move_entity(
        &self,
        id: &EntityId,
        target_id: Option<&EntityId>,
        position: i64,
    ) -> Result<T> {
        let _ = (id, target_id, position);
        Err(anyhow::anyhow!("move is not supported by this store"))
    }
}
