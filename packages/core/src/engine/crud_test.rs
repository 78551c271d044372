//! Engine Integration Tests
//!
//! Exercises the full optimistic lifecycle against the in-memory store:
//! immediate visibility, reconciliation, rollback on injected store
//! failures, the cycle guard, ordering policy, and the editing session.

use super::*;
use crate::models::{Folder, FolderPatch};
use crate::store::{EntityStore, MemoryStore};
use crate::tree;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn folder_config() -> EngineConfig<Folder> {
    EngineConfig::new("folder", "temp-folder")
}

fn folder_engine() -> (Arc<MemoryStore<Folder>>, CrudEngine<Folder>) {
    let store = Arc::new(MemoryStore::new());
    let engine = CrudEngine::new(store.clone(), folder_config());
    (store, engine)
}

async fn wait_for_pending(engine: &CrudEngine<Folder>) {
    for _ in 0..100 {
        if engine.has_pending_actions().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("no optimistic action became pending");
}

/// Store wrapper that parks one operation kind on a semaphore so a test can
/// hold an optimistic action in flight while other operations proceed.
struct GatedStore {
    inner: MemoryStore<Folder>,
    gated: Operation,
    permits: Semaphore,
}

impl GatedStore {
    fn new(gated: Operation) -> Self {
        Self {
            inner: MemoryStore::new(),
            gated,
            permits: Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass_gate(&self, operation: Operation) -> Result<()> {
        if operation == self.gated {
            let permit = self.permits.acquire().await?;
            permit.forget();
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore<Folder> for GatedStore {
    async fn create(&self, entity: Folder) -> Result<Folder> {
        self.pass_gate(Operation::Create).await?;
        self.inner.create(entity).await
    }

    async fn update(&self, id: &EntityId, patch: FolderPatch) -> Result<Folder> {
        self.pass_gate(Operation::Update).await?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.pass_gate(Operation::Delete).await?;
        self.inner.delete(id).await
    }

    fn supports_move(&self) -> bool {
        true
    }

    async fn move_entity(
        &self,
        id: &EntityId,
        target_id: Option<&EntityId>,
        position: i64,
    ) -> Result<Folder> {
        self.pass_gate(Operation::Move).await?;
        self.inner.move_entity(id, target_id, position).await
    }
}

#[tokio::test]
async fn create_appends_at_root_with_default_positions() {
    let (_store, engine) = folder_engine();

    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();

    assert_eq!(a.position, 0);
    assert_eq!(b.position, 1);
    assert!(!a.is_temp);
    assert!(a.id.as_persisted().is_some());

    let roots = engine.children_of(None).await;
    let names: Vec<&str> = roots.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[tokio::test]
async fn create_child_nests_and_appends_after_max_sibling() {
    let (_store, engine) = folder_engine();

    let parent = engine.create(FolderPatch::name("P"), None).await.unwrap();
    let c1 = engine
        .create_child(parent.id.clone(), FolderPatch::name("C1"))
        .await
        .unwrap();
    let c2 = engine
        .create_child(parent.id.clone(), FolderPatch::name("C2"))
        .await
        .unwrap();

    assert_eq!(c1.position, 0);
    assert_eq!(c2.position, 1);
    assert_eq!(c1.parent_id, Some(parent.id.clone()));

    let forest = engine.entities().await;
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].children.len(), 2);
}

#[tokio::test]
async fn failing_create_rolls_back_and_fires_on_error_once() {
    let store: Arc<MemoryStore<Folder>> = Arc::new(MemoryStore::new());
    let errors = Arc::new(AtomicUsize::new(0));
    let seen_temp = Arc::new(AtomicUsize::new(0));

    let hook_errors = errors.clone();
    let hook_temp = seen_temp.clone();
    let config = folder_config().with_on_error(move |operation, _error, entity| {
        assert_eq!(operation, Operation::Create);
        hook_errors.fetch_add(1, AtomicOrdering::SeqCst);
        if entity.map_or(false, |f| f.is_temp) {
            hook_temp.fetch_add(1, AtomicOrdering::SeqCst);
        }
    });
    let engine = CrudEngine::new(store.clone(), config);

    engine.create(FolderPatch::name("kept"), None).await.unwrap();
    let before = engine.entities().await;

    store.fail_next(Operation::Create, "network error").await;
    let err = engine
        .create(FolderPatch::name("X"), None)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("network error"));
    assert_eq!(errors.load(AtomicOrdering::SeqCst), 1);
    assert_eq!(seen_temp.load(AtomicOrdering::SeqCst), 1);

    // Tree is structurally identical to the pre-operation snapshot.
    assert_eq!(engine.entities().await, before);
    assert!(!engine.has_pending_actions().await);
}

#[tokio::test]
async fn update_reconciles_with_store_entity() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();

    let updated = engine
        .update(&a.id, FolderPatch::name("A2"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.name, "A2");
    assert_eq!(engine.find(&a.id).await.unwrap().name, "A2");
    assert_eq!(store.rows().await[0].name, "A2");
}

#[tokio::test]
async fn update_of_missing_id_is_a_silent_no_op() {
    let (store, engine) = folder_engine();
    engine.create(FolderPatch::name("A"), None).await.unwrap();

    // Armed failure proves no store call happens for the missing id.
    store.fail_next(Operation::Update, "must not fire").await;
    let result = engine
        .update(&EntityId::Persisted(999), FolderPatch::name("X"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn validation_rejection_skips_store_and_tree() {
    let store: Arc<MemoryStore<Folder>> = Arc::new(MemoryStore::new());
    let config = folder_config().with_validation_rule(|folder: &Folder| !folder.name.trim().is_empty());
    let engine = CrudEngine::new(store.clone(), config);

    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let before = engine.entities().await;

    store.fail_next(Operation::Update, "must not fire").await;
    let result = engine.update(&a.id, FolderPatch::name("   ")).await.unwrap();

    assert!(result.is_none());
    assert_eq!(engine.entities().await, before);
}

#[tokio::test]
async fn failing_update_restores_previous_entity() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let before = engine.entities().await;

    store.fail_next(Operation::Update, "constraint violation").await;
    let err = engine.update(&a.id, FolderPatch::name("A2")).await.unwrap_err();

    assert!(matches!(err, EngineError::StoreFailed { operation: Operation::Update, .. }));
    assert_eq!(engine.entities().await, before);
}

#[tokio::test]
async fn delete_of_missing_id_makes_no_store_call() {
    let (store, engine) = folder_engine();
    engine.create(FolderPatch::name("A"), None).await.unwrap();

    store.fail_next(Operation::Delete, "must not fire").await;
    let result = engine.delete(&EntityId::Persisted(999)).await.unwrap();

    assert!(result.is_none());
    assert_eq!(engine.entities().await.len(), 1);
}

#[tokio::test]
async fn failing_delete_restores_node_in_place() {
    let (store, engine) = folder_engine();
    let parent = engine.create(FolderPatch::name("P"), None).await.unwrap();
    let child = engine
        .create_child(parent.id.clone(), FolderPatch::name("C"))
        .await
        .unwrap();
    let before = engine.entities().await;

    store.fail_next(Operation::Delete, "foreign key violation").await;
    engine.delete(&child.id).await.unwrap_err();

    assert_eq!(engine.entities().await, before);
    assert_eq!(
        engine.find(&child.id).await.unwrap().parent_id,
        Some(parent.id)
    );
}

#[tokio::test]
async fn move_into_own_descendant_is_rejected_before_any_mutation() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine
        .create_child(a.id.clone(), FolderPatch::name("B"))
        .await
        .unwrap();
    let before = engine.entities().await;

    store.fail_next(Operation::Move, "must not fire").await;
    let err = engine.move_to(&a.id, Some(b.id.clone()), 0).await.unwrap_err();

    assert!(matches!(err, EngineError::CircularReference { .. }));
    assert_eq!(engine.entities().await, before);
    // A still has B as its child.
    assert_eq!(engine.find(&a.id).await.unwrap().children[0].id, b.id);
}

#[tokio::test]
async fn move_reparents_and_reconciles() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();
    let c = engine
        .create_child(a.id.clone(), FolderPatch::name("C"))
        .await
        .unwrap();

    let moved = engine
        .move_to(&c.id, Some(b.id.clone()), 0)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(moved.parent_id, Some(b.id.clone()));
    let forest = engine.entities().await;
    let a_node = tree::find_entity(&forest, &a.id).unwrap();
    let b_node = tree::find_entity(&forest, &b.id).unwrap();
    assert!(a_node.children.is_empty());
    assert_eq!(b_node.children.len(), 1);

    let row = store
        .rows()
        .await
        .into_iter()
        .find(|f| f.id == c.id)
        .unwrap();
    assert_eq!(row.parent_id, Some(b.id));
}

#[tokio::test]
async fn move_to_a_deleted_target_is_a_silent_no_op() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();
    engine.delete(&b.id).await.unwrap();

    store.fail_next(Operation::Move, "must not fire").await;
    let result = engine.move_to(&a.id, Some(b.id.clone()), 0).await.unwrap();

    assert!(result.is_none());
    // A keeps its place; no dangling parent reference was written.
    let a_after = engine.find(&a.id).await.unwrap();
    assert!(a_after.parent_id.is_none());
    assert_eq!(engine.entities().await.len(), 1);
}

#[tokio::test]
async fn create_under_an_unconfirmed_parent_is_rejected() {
    let store = Arc::new(GatedStore::new(Operation::Create));
    let engine = Arc::new(CrudEngine::new(store.clone(), folder_config()));

    let create_engine = engine.clone();
    let parked = tokio::spawn(async move {
        create_engine.create(FolderPatch::name("parent"), None).await
    });
    wait_for_pending(&engine).await;

    let temp = engine
        .entities()
        .await
        .into_iter()
        .find(|f| f.is_temp)
        .expect("temp node visible while create is in flight");

    let err = engine
        .create(FolderPatch::name("child"), Some(temp.id.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnconfirmedParent { .. }));
    // Only the parked parent's action is pending; the child never reached
    // the store or the log.
    assert!(store.inner.rows().await.is_empty());

    store.release();
    let parent = parked.await.unwrap().unwrap();
    let forest = engine.entities().await;
    assert_eq!(forest.len(), 1);
    assert!(engine.all_children(&parent.id).await.is_empty());
}

#[tokio::test]
async fn failing_move_leaves_unrelated_pending_update_intact() {
    let store = Arc::new(GatedStore::new(Operation::Update));
    let engine = Arc::new(CrudEngine::new(store.clone(), folder_config()));

    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();

    // Hold a rename of A in flight at the store boundary.
    let rename_engine = engine.clone();
    let a_id = a.id.clone();
    let rename = tokio::spawn(async move {
        rename_engine.update(&a_id, FolderPatch::name("A2")).await
    });
    wait_for_pending(&engine).await;
    assert_eq!(engine.find(&a.id).await.unwrap().name, "A2");

    // An unrelated move fails and rolls back while the rename is pending.
    store.inner.fail_next(Operation::Move, "network error").await;
    engine.move_to(&b.id, Some(a.id.clone()), 0).await.unwrap_err();

    // B reverted to the root, A's optimistic rename still displayed.
    let forest = engine.entities().await;
    assert!(tree::find_entity(&forest, &a.id).unwrap().children.is_empty());
    assert_eq!(tree::find_entity(&forest, &a.id).unwrap().name, "A2");
    assert!(tree::find_entity(&forest, &b.id).unwrap().parent_id.is_none());

    store.release();
    let renamed = rename.await.unwrap().unwrap().unwrap();
    assert_eq!(renamed.name, "A2");
    assert!(!engine.has_pending_actions().await);
}

#[tokio::test]
async fn temp_nodes_cannot_be_deleted_or_moved() {
    let store = Arc::new(GatedStore::new(Operation::Create));
    let engine = Arc::new(CrudEngine::new(store.clone(), folder_config()));

    let create_engine = engine.clone();
    let create = tokio::spawn(async move {
        create_engine.create(FolderPatch::name("parked"), None).await
    });
    wait_for_pending(&engine).await;

    let temp = engine
        .entities()
        .await
        .into_iter()
        .find(|f| f.is_temp)
        .expect("temp node visible while create is in flight");
    assert!(temp.id.is_temp());

    assert!(engine.delete(&temp.id).await.unwrap().is_none());
    assert!(engine.move_to(&temp.id, None, 5).await.unwrap().is_none());
    assert!(engine.find(&temp.id).await.is_some());

    store.release();
    let created = create.await.unwrap().unwrap();
    assert!(!created.is_temp);
    // Temp id was swapped for the persisted one.
    assert!(engine.find(&temp.id).await.is_none());
    assert!(engine.find(&created.id).await.is_some());
}

#[tokio::test]
async fn reorder_assigns_array_indices_as_positions() {
    let (_store, engine) = folder_engine();
    let f = engine.create(FolderPatch::name("F"), None).await.unwrap();
    let n1 = engine
        .create_child(f.id.clone(), FolderPatch::name("N1"))
        .await
        .unwrap();
    let n2 = engine
        .create_child(f.id.clone(), FolderPatch::name("N2"))
        .await
        .unwrap();
    let n3 = engine
        .create_child(f.id.clone(), FolderPatch::name("N3"))
        .await
        .unwrap();
    assert_eq!((n1.position, n2.position, n3.position), (0, 1, 2));
    assert_eq!(
        tree::sibling_ids(&engine.entities().await, Some(&f.id)),
        [n1.id.clone(), n2.id.clone(), n3.id.clone()]
    );

    engine
        .reorder(
            Some(&f.id),
            &[n3.id.clone(), n1.id.clone(), n2.id.clone()],
        )
        .await
        .unwrap();

    let children = engine.children_of(Some(&f.id)).await;
    let names: Vec<&str> = children.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["N3", "N1", "N2"]);
    let positions: Vec<i64> = children.iter().map(|f| f.position).collect();
    assert_eq!(positions, [0, 1, 2]);
}

#[tokio::test]
async fn reorder_subset_leaves_unlisted_siblings_unchanged() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();
    let c = engine.create(FolderPatch::name("C"), None).await.unwrap();

    engine.reorder(None, &[c.id.clone()]).await.unwrap();

    assert_eq!(engine.find(&c.id).await.unwrap().position, 0);
    assert_eq!(engine.find(&a.id).await.unwrap().position, 0);
    assert_eq!(engine.find(&b.id).await.unwrap().position, 1);
}

#[tokio::test]
async fn ids_stay_unique_across_create_delete_sequences() {
    let (_store, engine) = folder_engine();

    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();
    engine
        .create_child(a.id.clone(), FolderPatch::name("C"))
        .await
        .unwrap();
    engine.delete(&b.id).await.unwrap();
    engine.create(FolderPatch::name("D"), None).await.unwrap();

    fn flatten(forest: &[Folder], out: &mut Vec<EntityId>) {
        for f in forest {
            out.push(f.id.clone());
            flatten(&f.children, out);
        }
    }
    let mut ids = Vec::new();
    flatten(&engine.entities().await, &mut ids);
    let unique: HashSet<&EntityId> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn parent_chains_stay_acyclic_over_move_sequences() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();
    let c = engine
        .create_child(a.id.clone(), FolderPatch::name("C"))
        .await
        .unwrap();

    engine.move_to(&c.id, Some(b.id.clone()), 0).await.unwrap();
    engine.move_to(&a.id, Some(c.id.clone()), 0).await.unwrap();
    // a is now below c below b; closing the loop must fail.
    engine.move_to(&b.id, Some(a.id.clone()), 0).await.unwrap_err();

    let forest = engine.entities().await;
    for id in [&a.id, &b.id, &c.id] {
        let chain = engine.ancestors(id).await;
        assert!(chain.iter().all(|ancestor| ancestor.id != *id));
        let _ = tree::find_entity(&forest, id).unwrap();
    }
}

#[tokio::test]
async fn all_children_collects_exactly_the_descendants() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine
        .create_child(a.id.clone(), FolderPatch::name("B"))
        .await
        .unwrap();
    let c = engine
        .create_child(b.id.clone(), FolderPatch::name("C"))
        .await
        .unwrap();
    let outsider = engine.create(FolderPatch::name("Z"), None).await.unwrap();

    let ids: HashSet<EntityId> = engine
        .all_children(&a.id)
        .await
        .into_iter()
        .map(|f| f.id)
        .collect();

    assert_eq!(ids, HashSet::from([b.id, c.id]));
    assert!(!ids.contains(&outsider.id));
}

#[tokio::test]
async fn editing_session_commits_trimmed_draft() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();

    engine.start_editing(a.id.clone(), "A").await;
    assert!(engine.is_editing(&a.id).await);
    assert!(!engine.is_editing(&EntityId::Persisted(999)).await);

    engine.set_editing_value("  Renamed  ").await;
    let committed = engine.commit_edit(&a.id, "name").await.unwrap().unwrap();

    assert_eq!(committed.name, "Renamed");
    assert!(!engine.is_editing(&a.id).await);
    assert!(engine.editing_value().await.is_none());
}

#[tokio::test]
async fn empty_draft_no_ops_and_keeps_the_session() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();

    engine.start_editing(a.id.clone(), "   ").await;
    let result = engine.commit_edit(&a.id, "name").await.unwrap();

    assert!(result.is_none());
    assert!(engine.is_editing(&a.id).await);
    assert_eq!(engine.find(&a.id).await.unwrap().name, "A");
}

#[tokio::test]
async fn commit_edit_ignores_a_mismatched_target() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    let b = engine.create(FolderPatch::name("B"), None).await.unwrap();

    engine.start_editing(a.id.clone(), "A2").await;
    let result = engine.commit_edit(&b.id, "name").await.unwrap();

    assert!(result.is_none());
    assert_eq!(engine.find(&b.id).await.unwrap().name, "B");
    // The session still belongs to A and keeps its draft.
    assert!(engine.is_editing(&a.id).await);
    assert_eq!(engine.editing_value().await.as_deref(), Some("A2"));
}

#[tokio::test]
async fn failed_commit_still_clears_the_session() {
    let (store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();

    engine.start_editing(a.id.clone(), "A2").await;
    store.fail_next(Operation::Update, "network error").await;
    engine.commit_edit(&a.id, "name").await.unwrap_err();

    assert!(!engine.is_editing(&a.id).await);
    assert_eq!(engine.find(&a.id).await.unwrap().name, "A");
}

#[tokio::test]
async fn on_success_hook_fires_with_confirmed_entity() {
    let store: Arc<MemoryStore<Folder>> = Arc::new(MemoryStore::new());
    let confirmed = Arc::new(AtomicUsize::new(0));
    let hook_confirmed = confirmed.clone();
    let config = folder_config().with_on_success(move |operation, entity: &Folder| {
        if operation == Operation::Create {
            assert!(!entity.is_temp);
            assert!(entity.id.as_persisted().is_some());
        }
        hook_confirmed.fetch_add(1, AtomicOrdering::SeqCst);
    });
    let engine = CrudEngine::new(store, config);

    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();
    engine.update(&a.id, FolderPatch::name("A2")).await.unwrap();
    engine.delete(&a.id).await.unwrap();

    assert_eq!(confirmed.load(AtomicOrdering::SeqCst), 3);
}

#[tokio::test]
async fn set_entities_rebases_pending_actions_on_the_new_baseline() {
    let (_store, engine) = folder_engine();
    let a = engine.create(FolderPatch::name("A"), None).await.unwrap();

    // Authoritative refetch, hydrated from flat rows.
    let mut refreshed = a.clone();
    refreshed.name = "A-from-server".to_string();
    engine.set_entities(tree::build_forest(vec![refreshed])).await;

    assert_eq!(engine.find(&a.id).await.unwrap().name, "A-from-server");
}
