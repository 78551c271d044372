//! In-Memory Reference Store
//!
//! A complete `EntityStore` implementation over a flat in-memory row set,
//! with monotonic numeric id assignment and full move support. Used by the
//! engine test suite (including per-operation failure injection to exercise
//! rollback paths) and usable by embedders as a scratch backend.

use crate::engine::Operation;
use crate::models::{EntityId, TreeEntity};
use crate::store::EntityStore;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

/// Flat in-memory backing store for one entity collection.
pub struct MemoryStore<T: TreeEntity> {
    rows: Mutex<Vec<T>>,
    next_id: AtomicI64,
    /// One-shot failure injection keyed by operation.
    fail_next: Mutex<Option<(Operation, String)>>,
}

impl<T: TreeEntity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TreeEntity> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            fail_next: Mutex::new(None),
        }
    }

    /// Make the next call of `operation` fail with `message`.
    pub async fn fail_next(&self, operation: Operation, message: impl Into<String>) {
        let mut fail = self.fail_next.lock().await;
        *fail = Some((operation, message.into()));
    }

    /// Snapshot of the flat row set, for assertions.
    pub async fn rows(&self) -> Vec<T> {
        self.rows.lock().await.clone()
    }

    async fn take_failure(&self, operation: Operation) -> Option<String> {
        let mut fail = self.fail_next.lock().await;
        match fail.take() {
            Some((op, message)) if op == operation => Some(message),
            other => {
                *fail = other;
                None
            }
        }
    }
}

#[async_trait]
impl<T: TreeEntity> EntityStore<T> for MemoryStore<T> {
    async fn create(&self, mut entity: T) -> Result<T> {
        if let Some(message) = self.take_failure(Operation::Create).await {
            bail!(message);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entity.set_id(EntityId::Persisted(id));
        entity.set_temp(false);

        let mut rows = self.rows.lock().await;
        rows.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, patch: T::Patch) -> Result<T> {
        if let Some(message) = self.take_failure(Operation::Update).await {
            bail!(message);
        }

        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == id)
            .ok_or_else(|| anyhow!("entity {} not found", id))?;
        row.apply_patch(&patch);
        row.touch(Utc::now());
        Ok(row.clone())
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        if let Some(message) = self.take_failure(Operation::Delete).await {
            bail!(message);
        }

        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|row| row.id() != id);
        if rows.len() == before {
            bail!("entity {} not found", id);
        }
        Ok(())
    }

    fn supports_move(&self) -> bool {
        true
    }

    async fn move_entity(
        &self,
        id: &EntityId,
        target_id: Option<&EntityId>,
        position: i64,
    ) -> Result<T> {
        if let Some(message) = self.take_failure(Operation::Move).await {
            bail!(message);
        }

        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|row| row.id() == id)
            .ok_or_else(|| anyhow!("entity {} not found", id))?;
        row.set_parent_id(target_id.cloned());
        row.set_position(position);
        row.touch(Utc::now());
        Ok(row.clone())
    }
}
