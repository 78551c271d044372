//! Optimistic Action Log
//!
//! A strictly append-only list of mutations that have been applied to the
//! displayed tree but not yet confirmed by the backing store. The displayed
//! forest is always the fold of the confirmed forest plus every pending
//! action in submission order.
//!
//! Confirmation and rollback are the same operation on the log: remove the
//! action. On success the action's effect has been baked into the confirmed
//! forest first; on failure nothing else happens, so the next replay simply
//! no longer shows the optimistic change. Removing one action never
//! disturbs the effect of other still-pending actions.

use crate::models::{EntityId, TreeEntity};
use crate::tree;
use chrono::{DateTime, Utc};

/// Handle identifying one pending action for later confirmation/rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionToken(u64);

/// One optimistic mutation awaiting store confirmation.
#[derive(Debug, Clone)]
pub enum OptimisticAction<T: TreeEntity> {
    /// Insert a temp entity under `parent_id` (root when `None`).
    Create {
        entity: T,
        parent_id: Option<EntityId>,
    },
    Update {
        id: EntityId,
        patch: T::Patch,
    },
    Delete {
        id: EntityId,
    },
    Move {
        id: EntityId,
        target_id: Option<EntityId>,
        position: i64,
    },
}

#[derive(Debug, Clone)]
struct PendingAction<T: TreeEntity> {
    token: ActionToken,
    /// Timestamp captured at append time so replay stays deterministic.
    applied_at: DateTime<Utc>,
    action: OptimisticAction<T>,
}

/// Append-only log of pending optimistic actions.
#[derive(Debug)]
pub struct ActionLog<T: TreeEntity> {
    next_token: u64,
    pending: Vec<PendingAction<T>>,
}

impl<T: TreeEntity> Default for ActionLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TreeEntity> ActionLog<T> {
    pub fn new() -> Self {
        Self {
            next_token: 0,
            pending: Vec::new(),
        }
    }

    /// Append an action, returning the token used to settle it later.
    pub fn append(&mut self, action: OptimisticAction<T>, applied_at: DateTime<Utc>) -> ActionToken {
        let token = ActionToken(self.next_token);
        self.next_token += 1;
        self.pending.push(PendingAction {
            token,
            applied_at,
            action,
        });
        token
    }

    /// Settle (confirm or roll back) the action behind `token`.
    pub fn remove(&mut self, token: ActionToken) -> Option<OptimisticAction<T>> {
        let index = self.pending.iter().position(|p| p.token == token)?;
        Some(self.pending.remove(index).action)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Fold every pending action, in submission order, over the confirmed
    /// forest to produce the tree the UI renders.
    pub fn replay(&self, confirmed: &[T]) -> Vec<T> {
        let mut forest: Vec<T> = confirmed.to_vec();
        for pending in &self.pending {
            forest = match &pending.action {
                OptimisticAction::Create { entity, parent_id } => {
                    tree::add_entity(forest, entity.clone(), parent_id.as_ref())
                }
                OptimisticAction::Update { id, patch } => {
                    tree::update_entity(forest, id, patch, pending.applied_at)
                }
                OptimisticAction::Delete { id } => tree::remove_entity(forest, id),
                OptimisticAction::Move {
                    id,
                    target_id,
                    position,
                } => tree::move_entity(forest, id, target_id.as_ref(), *position, pending.applied_at),
            };
        }
        forest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Folder, FolderPatch};

    fn folder(id: i64, name: &str) -> Folder {
        let mut f = Folder::new_entity(Utc::now());
        f.id = EntityId::Persisted(id);
        f.name = name.to_string();
        f
    }

    #[test]
    fn replay_folds_in_submission_order() {
        let confirmed = vec![folder(1, "A")];
        let mut log: ActionLog<Folder> = ActionLog::new();

        let mut temp = folder(0, "B");
        temp.id = EntityId::Temp("temp-folder-0-0".to_string());
        temp.is_temp = true;
        log.append(
            OptimisticAction::Create {
                entity: temp,
                parent_id: Some(EntityId::Persisted(1)),
            },
            Utc::now(),
        );
        log.append(
            OptimisticAction::Update {
                id: EntityId::Persisted(1),
                patch: FolderPatch::name("A2"),
            },
            Utc::now(),
        );

        let displayed = log.replay(&confirmed);
        assert_eq!(displayed[0].name, "A2");
        assert_eq!(displayed[0].children.len(), 1);
        assert_eq!(displayed[0].children[0].name, "B");
        // Confirmed forest untouched by replay
        assert_eq!(confirmed[0].name, "A");
        assert!(confirmed[0].children.is_empty());
    }

    #[test]
    fn removing_one_action_keeps_the_others_applied() {
        let confirmed = vec![folder(1, "A"), folder(2, "B")];
        let mut log: ActionLog<Folder> = ActionLog::new();

        let rename = log.append(
            OptimisticAction::Update {
                id: EntityId::Persisted(1),
                patch: FolderPatch::name("A2"),
            },
            Utc::now(),
        );
        let delete = log.append(
            OptimisticAction::Delete {
                id: EntityId::Persisted(2),
            },
            Utc::now(),
        );

        assert!(log.remove(rename).is_some());
        assert!(log.remove(rename).is_none());

        let displayed = log.replay(&confirmed);
        assert_eq!(displayed.len(), 1);
        assert_eq!(displayed[0].name, "A");

        log.remove(delete);
        assert!(log.is_empty());
        assert_eq!(log.replay(&confirmed).len(), 2);
    }

    #[test]
    fn replay_of_empty_log_is_the_confirmed_forest() {
        let confirmed = vec![folder(1, "A")];
        let log: ActionLog<Folder> = ActionLog::new();
        assert_eq!(log.replay(&confirmed), confirmed);
        assert_eq!(log.len(), 0);
    }
}
