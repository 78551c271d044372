//! CRUD Operations Engine
//!
//! Binds the pure tree functions and the optimistic action log to a
//! concrete [`EntityStore`] adapter. Every mutating operation follows the
//! same state machine per in-flight mutation:
//!
//! ```text
//! idle -> optimistic-applied -> { confirmed | rolled-back } -> idle
//! ```
//!
//! The optimistic apply and the reconciliation are synchronous; the only
//! suspension point is the store round-trip, and the internal mutex is
//! never held across it. Operations targeting different entities may
//! therefore be in flight concurrently, and the displayed tree transiently
//! shows all of their optimistic states. Operations racing on the *same*
//! entity id are the caller's responsibility to serialize.

use crate::engine::actions::{ActionLog, OptimisticAction};
use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, Operation};
use crate::models::{EntityId, TreeEntity};
use crate::store::EntityStore;
use crate::tree;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single-field editing session (rename-in-place and similar flows).
#[derive(Debug, Clone)]
struct EditSession {
    id: EntityId,
    value: String,
}

#[derive(Debug)]
struct EngineState<T: TreeEntity> {
    /// Last-known-good forest: every node here is store-confirmed.
    confirmed: Vec<T>,
    /// Pending optimistic actions folded over `confirmed` for display.
    log: ActionLog<T>,
    editing: Option<EditSession>,
}

/// Optimistic CRUD engine for one hierarchical entity collection.
///
/// One instance owns one forest (e.g. the folders of a workspace); a second
/// collection (notes) gets its own instance with its own store adapter.
/// Cross-collection coordination, such as cascading a folder delete to its
/// notes, is orchestrated by the caller sequencing calls to each instance.
pub struct CrudEngine<T: TreeEntity> {
    store: Arc<dyn EntityStore<T>>,
    config: EngineConfig<T>,
    state: Mutex<EngineState<T>>,
}

impl<T: TreeEntity> CrudEngine<T> {
    /// Create an engine with an empty confirmed forest.
    pub fn new(store: Arc<dyn EntityStore<T>>, config: EngineConfig<T>) -> Self {
        Self::with_entities(store, config, Vec::new())
    }

    /// Create an engine seeded with an already-fetched confirmed forest.
    pub fn with_entities(
        store: Arc<dyn EntityStore<T>>,
        config: EngineConfig<T>,
        entities: Vec<T>,
    ) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(EngineState {
                confirmed: entities,
                log: ActionLog::new(),
                editing: None,
            }),
        }
    }

    /// Replace the confirmed forest with an authoritative refetch.
    ///
    /// Pending optimistic actions stay in the log and are replayed on top
    /// of the new baseline.
    pub async fn set_entities(&self, entities: Vec<T>) {
        let mut state = self.state.lock().await;
        state.confirmed = entities;
    }

    /// The reconciled forest: confirmed entities plus every pending
    /// optimistic action, each sibling group sorted ascending by position.
    pub async fn entities(&self) -> Vec<T> {
        let state = self.state.lock().await;
        let mut displayed = state.log.replay(&state.confirmed);
        tree::sort_forest(&mut displayed);
        displayed
    }

    /// Depth-first lookup in the displayed (confirmed + optimistic) forest.
    pub async fn find(&self, id: &EntityId) -> Option<T> {
        let state = self.state.lock().await;
        let displayed = state.log.replay(&state.confirmed);
        tree::find_entity(&displayed, id).cloned()
    }

    /// Direct children of `parent_id` (forest roots when `None`), sorted.
    pub async fn children_of(&self, parent_id: Option<&EntityId>) -> Vec<T> {
        let mut displayed = self.entities().await;
        match parent_id {
            None => displayed,
            Some(parent_id) => tree::find_entity(&displayed, parent_id)
                .and_then(|parent| parent.children())
                .map(|children| children.to_vec())
                .unwrap_or_else(|| {
                    displayed.retain(|node| node.parent_id() == Some(parent_id));
                    displayed
                }),
        }
    }

    /// Whether any optimistic action is still awaiting its store call.
    pub async fn has_pending_actions(&self) -> bool {
        !self.state.lock().await.log.is_empty()
    }

    pub(crate) async fn displayed(&self) -> Vec<T> {
        let state = self.state.lock().await;
        state.log.replay(&state.confirmed)
    }

    /// Optimistically create an entity and persist it.
    ///
    /// The entity starts from the type's defaults merged with `data`, gets
    /// a temporary id, `is_temp`, and an append-at-end position under
    /// `parent_id`, and is immediately visible in [`entities`](Self::entities).
    /// Leaf collections keep `parent_id` as a cross-collection reference and
    /// place the entity at the forest root. A `parent_id` that is itself a
    /// temporary id is rejected with [`EngineError::UnconfirmedParent`]
    /// before anything is applied.
    /// On confirmation the temp node is swapped for the persisted one under
    /// the same parent; on failure it disappears and the error propagates
    /// after the `on_error` hook fired.
    pub async fn create(&self, data: T::Patch, parent_id: Option<EntityId>) -> Result<T, EngineError> {
        // A temp parent has no durable id for the store to resolve, and the
        // confirmed forest will never contain it; the parent must settle
        // before children can be placed under it.
        if let Some(parent_id) = &parent_id {
            if parent_id.is_temp() {
                let context = format!("cannot create under unconfirmed parent {}", parent_id);
                tracing::debug!("{} create rejected: {}", self.config.entity_name, context);
                return Err(EngineError::unconfirmed_parent(context));
            }
        }

        let now = Utc::now();
        let temp_id = EntityId::temp(&self.config.temp_id_prefix);

        let (token, temp_entity, placement) = {
            let mut state = self.state.lock().await;
            let displayed = state.log.replay(&state.confirmed);

            let mut entity = T::new_entity(now);
            // Leaf collections stay flat: their parent id references a node
            // in another collection, so placement is always the root.
            let placement = if entity.children().is_none() {
                None
            } else {
                parent_id.clone()
            };
            entity.set_position(tree::next_position(&displayed, parent_id.as_ref()));
            entity.apply_patch(&data);
            entity.set_id(temp_id);
            entity.set_parent_id(parent_id.clone());
            entity.set_temp(true);

            let token = state.log.append(
                OptimisticAction::Create {
                    entity: entity.clone(),
                    parent_id: placement.clone(),
                },
                now,
            );
            (token, entity, placement)
        };
        tracing::debug!(
            "{} create pending as {}",
            self.config.entity_name,
            temp_entity.id()
        );

        match self.store.create(temp_entity.clone()).await {
            Ok(mut created) => {
                created.set_temp(false);
                let mut state = self.state.lock().await;
                state.log.remove(token);
                let confirmed = std::mem::take(&mut state.confirmed);
                state.confirmed = tree::add_entity(confirmed, created.clone(), placement.as_ref());
                drop(state);

                tracing::debug!(
                    "{} create confirmed: {} -> {}",
                    self.config.entity_name,
                    temp_entity.id(),
                    created.id()
                );
                self.notify_success(Operation::Create, &created);
                Ok(created)
            }
            Err(source) => {
                self.rollback(token).await;
                let error = EngineError::store_failed(Operation::Create, source);
                tracing::warn!("{} create rolled back: {}", self.config.entity_name, error);
                self.notify_error(Operation::Create, &error, Some(&temp_entity));
                Err(error)
            }
        }
    }

    /// Optimistically patch an entity and persist the patch.
    ///
    /// Resolves to `Ok(None)` without touching anything when the target is
    /// absent (a concurrent delete may have raced us), still unconfirmed,
    /// or the configured validation rule rejects the patched entity. On
    /// confirmation the store's returned entity replaces the target so
    /// server-computed fields reconcile too.
    pub async fn update(&self, id: &EntityId, patch: T::Patch) -> Result<Option<T>, EngineError> {
        let now = Utc::now();

        let (token, previous) = {
            let mut state = self.state.lock().await;
            let displayed = state.log.replay(&state.confirmed);
            let Some(current) = tree::find_entity(&displayed, id) else {
                tracing::debug!("{} update skipped: {} not found", self.config.entity_name, id);
                return Ok(None);
            };
            if current.is_temp() {
                tracing::debug!(
                    "{} update skipped: {} is still unconfirmed",
                    self.config.entity_name,
                    id
                );
                return Ok(None);
            }

            if let Some(rule) = &self.config.validation_rule {
                let mut patched = current.clone();
                patched.apply_patch(&patch);
                if !rule(&patched) {
                    tracing::debug!(
                        "{} update rejected by validation rule: {}",
                        self.config.entity_name,
                        id
                    );
                    return Ok(None);
                }
            }

            let previous = current.clone();
            let token = state.log.append(
                OptimisticAction::Update {
                    id: id.clone(),
                    patch: patch.clone(),
                },
                now,
            );
            (token, previous)
        };

        match self.store.update(id, patch).await {
            Ok(updated) => {
                let mut state = self.state.lock().await;
                state.log.remove(token);
                let confirmed = std::mem::take(&mut state.confirmed);
                state.confirmed = tree::replace_entity(confirmed, id, &updated);
                drop(state);

                self.notify_success(Operation::Update, &updated);
                Ok(Some(updated))
            }
            Err(source) => {
                self.rollback(token).await;
                let error = EngineError::store_failed(Operation::Update, source);
                tracing::warn!("{} update rolled back: {}", self.config.entity_name, error);
                self.notify_error(Operation::Update, &error, Some(&previous));
                Err(error)
            }
        }
    }

    /// Optimistically remove an entity and persist the deletion.
    ///
    /// Resolves to `Ok(None)` without a store call when the target is
    /// absent or still unconfirmed (temp nodes must settle before they can
    /// be destroyed). On failure the node reappears exactly where it was.
    pub async fn delete(&self, id: &EntityId) -> Result<Option<T>, EngineError> {
        let now = Utc::now();

        let (token, entity) = {
            let mut state = self.state.lock().await;
            let displayed = state.log.replay(&state.confirmed);
            let Some(entity) = tree::find_entity(&displayed, id) else {
                tracing::debug!("{} delete skipped: {} not found", self.config.entity_name, id);
                return Ok(None);
            };
            if entity.is_temp() {
                tracing::debug!(
                    "{} delete skipped: {} is still unconfirmed",
                    self.config.entity_name,
                    id
                );
                return Ok(None);
            }

            let entity = entity.clone();
            let token = state
                .log
                .append(OptimisticAction::Delete { id: id.clone() }, now);
            (token, entity)
        };

        match self.store.delete(id).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.log.remove(token);
                let confirmed = std::mem::take(&mut state.confirmed);
                state.confirmed = tree::remove_entity(confirmed, id);
                drop(state);

                self.notify_success(Operation::Delete, &entity);
                Ok(Some(entity))
            }
            Err(source) => {
                self.rollback(token).await;
                let error = EngineError::store_failed(Operation::Delete, source);
                tracing::warn!("{} delete rolled back: {}", self.config.entity_name, error);
                self.notify_error(Operation::Delete, &error, Some(&entity));
                Err(error)
            }
        }
    }

    /// Optimistically reparent an entity and persist the move.
    ///
    /// Resolves to `Ok(None)` when the store does not support moves, when
    /// the entity is absent or unconfirmed, or when a container forest's
    /// target parent is absent or unconfirmed (a concurrent delete may have
    /// raced us). A move that would make the entity its
    /// own ancestor is rejected with [`EngineError::CircularReference`]
    /// before anything is applied; the guard runs against the confirmed
    /// forest. On failure, dropping the pending action restores the
    /// pre-move tree without reverting unrelated in-flight actions.
    pub async fn move_to(
        &self,
        id: &EntityId,
        target_id: Option<EntityId>,
        position: i64,
    ) -> Result<Option<T>, EngineError> {
        if !self.store.supports_move() {
            tracing::debug!(
                "{} move skipped: store does not support moves",
                self.config.entity_name
            );
            return Ok(None);
        }
        let now = Utc::now();

        let (token, entity) = {
            let mut state = self.state.lock().await;
            let displayed = state.log.replay(&state.confirmed);
            let Some(entity) = tree::find_entity(&displayed, id) else {
                tracing::debug!("{} move skipped: {} not found", self.config.entity_name, id);
                return Ok(None);
            };
            if entity.is_temp() {
                tracing::debug!(
                    "{} move skipped: {} is still unconfirmed",
                    self.config.entity_name,
                    id
                );
                return Ok(None);
            }

            // In a container forest the target must be a live, confirmed
            // node; a concurrent delete may have raced us. Leaf collections
            // skip this: their target is a reference into another collection.
            if let Some(target_id) = &target_id {
                if entity.children().is_some() {
                    match tree::find_entity(&displayed, target_id) {
                        None => {
                            tracing::debug!(
                                "{} move skipped: target {} not found",
                                self.config.entity_name,
                                target_id
                            );
                            return Ok(None);
                        }
                        Some(target) if target.is_temp() => {
                            tracing::debug!(
                                "{} move skipped: target {} is still unconfirmed",
                                self.config.entity_name,
                                target_id
                            );
                            return Ok(None);
                        }
                        Some(_) => {}
                    }
                }
            }

            if tree::would_create_cycle(&state.confirmed, id, target_id.as_ref()) {
                let context = match &target_id {
                    Some(target_id) => format!("cannot move {} under its own descendant {}", id, target_id),
                    None => format!("parent chain of {} already loops", id),
                };
                return Err(EngineError::circular_reference(context));
            }

            let entity = entity.clone();
            let token = state.log.append(
                OptimisticAction::Move {
                    id: id.clone(),
                    target_id: target_id.clone(),
                    position,
                },
                now,
            );
            (token, entity)
        };

        match self.store.move_entity(id, target_id.as_ref(), position).await {
            Ok(moved) => {
                let mut state = self.state.lock().await;
                state.log.remove(token);
                let confirmed = std::mem::take(&mut state.confirmed);
                let confirmed = tree::move_entity(confirmed, id, target_id.as_ref(), position, now);
                state.confirmed = tree::replace_entity(confirmed, id, &moved);
                drop(state);

                self.notify_success(Operation::Move, &moved);
                Ok(Some(moved))
            }
            Err(source) => {
                self.rollback(token).await;
                let error = EngineError::store_failed(Operation::Move, source);
                tracing::warn!("{} move rolled back: {}", self.config.entity_name, error);
                self.notify_error(Operation::Move, &error, Some(&entity));
                Err(error)
            }
        }
    }

    /// Renumber the listed siblings so each id's new `position` equals its
    /// index, written individually through [`update`](Self::update).
    ///
    /// Ids absent from the displayed tree are skipped silently. Siblings of
    /// `parent_id` not listed keep their positions; callers pass the
    /// complete sibling set when a full re-sort is intended.
    pub async fn reorder(
        &self,
        parent_id: Option<&EntityId>,
        ordered_ids: &[EntityId],
    ) -> Result<(), EngineError> {
        for (index, id) in ordered_ids.iter().enumerate() {
            self.update(id, T::patch_position(index as i64)).await?;
        }
        tracing::debug!(
            "{} reorder of {} sibling(s) under {:?} confirmed",
            self.config.entity_name,
            ordered_ids.len(),
            parent_id.map(|id| id.to_string())
        );
        Ok(())
    }

    /// Begin editing one entity's text field with an initial draft value.
    pub async fn start_editing(&self, id: EntityId, initial_value: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.editing = Some(EditSession {
            id,
            value: initial_value.into(),
        });
    }

    /// Drop the editing session without persisting the draft.
    pub async fn cancel_editing(&self) {
        let mut state = self.state.lock().await;
        state.editing = None;
    }

    pub async fn set_editing_value(&self, value: impl Into<String>) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.editing.as_mut() {
            session.value = value.into();
        }
    }

    pub async fn editing_value(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.editing.as_ref().map(|session| session.value.clone())
    }

    pub async fn is_editing(&self, id: &EntityId) -> bool {
        let state = self.state.lock().await;
        state.editing.as_ref().map_or(false, |session| &session.id == id)
    }

    /// Commit the current draft into `field` of the entity with `id`.
    ///
    /// The draft belongs to the session's entity: a stale call carrying a
    /// different `id` is a no-op that leaves the session intact. The draft
    /// is trimmed first; an empty draft is a no-op that keeps the session
    /// open. Otherwise the session is cleared regardless of whether the
    /// underlying update succeeds or rolls back.
    pub async fn commit_edit(&self, id: &EntityId, field: &str) -> Result<Option<T>, EngineError> {
        let draft = {
            let state = self.state.lock().await;
            state
                .editing
                .as_ref()
                .filter(|session| &session.id == id)
                .map(|session| session.value.trim().to_string())
        };
        let Some(draft) = draft else {
            return Ok(None);
        };
        if draft.is_empty() {
            return Ok(None);
        }

        let Some(patch) = T::patch_field(field, &draft) else {
            tracing::warn!(
                "{} commit_edit skipped: no editable field '{}'",
                self.config.entity_name,
                field
            );
            self.cancel_editing().await;
            return Ok(None);
        };

        let result = self.update(id, patch).await;
        self.cancel_editing().await;
        result
    }

    async fn rollback(&self, token: crate::engine::actions::ActionToken) {
        let mut state = self.state.lock().await;
        state.log.remove(token);
    }

    fn notify_success(&self, operation: Operation, entity: &T) {
        if let Some(hook) = &self.config.on_success {
            hook(operation, entity);
        }
    }

    fn notify_error(&self, operation: Operation, error: &EngineError, entity: Option<&T>) {
        if let Some(hook) = &self.config.on_error {
            hook(operation, error, entity);
        }
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "crud_test.rs"]
mod crud_test;
