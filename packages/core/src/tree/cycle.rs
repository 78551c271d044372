//! Cycle Guard
//!
//! Reparenting must never make a node its own ancestor. The guard walks
//! from the proposed new parent up through successive `parent_id` links; if
//! the walk reaches the node being moved, the move would create a cycle.
//! The walk runs over the confirmed forest, since the moved node's own
//! optimistic state has no bearing on whether the target sits below it.

use crate::models::{EntityId, TreeEntity};
use crate::tree::find_entity;
use std::collections::HashSet;

/// Whether reparenting `entity_id` under `new_parent_id` would make the
/// entity its own ancestor.
///
/// Moving to the forest root (`new_parent_id == None`) can never cycle.
/// Moving a node under itself counts as a cycle. An already-malformed
/// parent chain (a loop that does not include `entity_id`) is also reported
/// as a cycle rather than walked forever.
pub fn would_create_cycle<T: TreeEntity>(
    forest: &[T],
    entity_id: &EntityId,
    new_parent_id: Option<&EntityId>,
) -> bool {
    let mut visited: HashSet<EntityId> = HashSet::new();
    let mut current = new_parent_id.cloned();

    while let Some(ancestor_id) = current {
        if &ancestor_id == entity_id {
            return true;
        }
        if !visited.insert(ancestor_id.clone()) {
            tracing::warn!(
                "cycle guard: parent chain of {} already loops at {}",
                entity_id,
                ancestor_id
            );
            return true;
        }
        current = find_entity(forest, &ancestor_id).and_then(|node| node.parent_id().cloned());
    }

    false
}
