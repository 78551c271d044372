//! Hierarchical Extension
//!
//! Parent/child-aware helpers layered on top of the base CRUD operations
//! for entity kinds that nest. Nothing here holds state of its own; every
//! helper reads the same displayed forest the base engine exposes.

use crate::engine::crud::CrudEngine;
use crate::engine::error::EngineError;
use crate::models::{EntityId, TreeEntity};
use crate::tree;

impl<T: TreeEntity> CrudEngine<T> {
    /// Create an entity directly under `parent_id`.
    ///
    /// Sugar for [`create`](Self::create) with the parent reference baked
    /// into the entity as well as the placement.
    pub async fn create_child(
        &self,
        parent_id: EntityId,
        data: T::Patch,
    ) -> Result<T, EngineError> {
        self.create(data, Some(parent_id)).await
    }

    /// Every descendant of `parent_id` (children, grandchildren, ...),
    /// flattened. Matches on `parent_id` at every level of the displayed
    /// forest, so it works for flat leaf collections too.
    pub async fn all_children(&self, parent_id: &EntityId) -> Vec<T> {
        let displayed = self.displayed().await;
        tree::collect_descendants(&displayed, parent_id)
    }

    /// Ancestor chain of `id` in the displayed forest, nearest parent first.
    pub async fn ancestors(&self, id: &EntityId) -> Vec<T> {
        let displayed = self.displayed().await;
        tree::collect_ancestors(&displayed, id)
    }
}
