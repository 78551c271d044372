//! Pure Forest Manipulation
//!
//! Side-effect-free functions over a forest (an ordered `Vec` of root
//! entities, each possibly carrying nested children). Every function takes
//! the forest by value and returns a new one; nothing here touches shared
//! state, which is what lets the optimistic action log replay
//! deterministically and roll back by simply not replaying an action.
//!
//! Also home to the position/ordering policy helpers (`next_position`,
//! `sort_forest`) and the flat-to-nested builder used when hydrating a
//! forest from a store query.

mod cycle;

pub use cycle::would_create_cycle;

use crate::models::{EntityId, TreeEntity};
use chrono::{DateTime, Utc};

/// Insert `entity` under `parent_id`, or at the forest root when `parent_id`
/// is `None`.
///
/// If the parent cannot be found (or is a leaf type that cannot hold
/// children) the forest is returned unchanged; callers treat that as a
/// logic error upstream, not a panic here.
pub fn add_entity<T: TreeEntity>(forest: Vec<T>, entity: T, parent_id: Option<&EntityId>) -> Vec<T> {
    let Some(parent_id) = parent_id else {
        let mut forest = forest;
        forest.push(entity);
        return forest;
    };

    let (forest, leftover) = insert_under(forest, parent_id, entity);
    if leftover.is_some() {
        tracing::debug!("add_entity: parent {} not found, forest unchanged", parent_id);
    }
    forest
}

fn insert_under<T: TreeEntity>(
    nodes: Vec<T>,
    parent_id: &EntityId,
    entity: T,
) -> (Vec<T>, Option<T>) {
    let mut pending = Some(entity);
    let mut out = Vec::with_capacity(nodes.len());

    for mut node in nodes {
        if pending.is_some() && node.id() == parent_id {
            // A leaf parent cannot hold children; the entity stays pending
            // and the forest comes back unchanged.
            if let Some(children) = node.ensure_children() {
                if let Some(entity) = pending.take() {
                    children.push(entity);
                }
            }
        } else if let Some(entity) = pending.take() {
            if let Some(children) = node.children_mut() {
                let nested = std::mem::take(children);
                let (nested, leftover) = insert_under(nested, parent_id, entity);
                *children = nested;
                pending = leftover;
            } else {
                pending = Some(entity);
            }
        }
        out.push(node);
    }

    (out, pending)
}

/// Remove the entity with `id` from wherever it appears, root or nested.
pub fn remove_entity<T: TreeEntity>(forest: Vec<T>, id: &EntityId) -> Vec<T> {
    forest
        .into_iter()
        .filter(|node| node.id() != id)
        .map(|mut node| {
            if let Some(children) = node.children_mut() {
                let nested = std::mem::take(children);
                *children = remove_entity(nested, id);
            }
            node
        })
        .collect()
}

/// Merge `patch` into the entity with `id`, refreshing its `updated_at`.
///
/// Children of the target are only altered when the patch itself carries a
/// children value.
pub fn update_entity<T: TreeEntity>(
    forest: Vec<T>,
    id: &EntityId,
    patch: &T::Patch,
    now: DateTime<Utc>,
) -> Vec<T> {
    forest
        .into_iter()
        .map(|mut node| {
            if node.id() == id {
                node.apply_patch(patch);
                node.touch(now);
            } else if let Some(children) = node.children_mut() {
                let nested = std::mem::take(children);
                *children = update_entity(nested, id, patch, now);
            }
            node
        })
        .collect()
}

/// Swap the entity with `id` for `replacement` wholesale.
///
/// Used at reconciliation time to bake a store-confirmed entity into the
/// forest. When the replacement carries no children of its own, the
/// existing subtree is preserved (stores routinely return flat rows).
pub fn replace_entity<T: TreeEntity>(forest: Vec<T>, id: &EntityId, replacement: &T) -> Vec<T> {
    forest
        .into_iter()
        .map(|mut node| {
            if node.id() == id {
                let mut fresh = replacement.clone();
                let replacement_is_flat = fresh.children().map_or(true, |c| c.is_empty());
                if replacement_is_flat {
                    if let (Some(old), Some(new)) = (node.children_mut(), fresh.children_mut()) {
                        *new = std::mem::take(old);
                    }
                }
                fresh
            } else {
                if let Some(children) = node.children_mut() {
                    let nested = std::mem::take(children);
                    *children = replace_entity(nested, id, replacement);
                }
                node
            }
        })
        .collect()
}

/// Relocate the entity with `id` under `target_parent` (or the root) at the
/// given `position`, refreshing its `updated_at`.
///
/// Does not run the cycle guard; callers validate with
/// [`would_create_cycle`] first. If either the entity or the target parent
/// cannot be found, the forest is returned unchanged.
pub fn move_entity<T: TreeEntity>(
    forest: Vec<T>,
    id: &EntityId,
    target_parent: Option<&EntityId>,
    position: i64,
    now: DateTime<Utc>,
) -> Vec<T> {
    let Some(mut entity) = find_entity(&forest, id).cloned() else {
        return forest;
    };
    entity.set_parent_id(target_parent.cloned());
    entity.set_position(position);
    entity.touch(now);

    let without = remove_entity(forest, id);
    match target_parent {
        None => {
            let mut forest = without;
            forest.push(entity);
            forest
        }
        Some(parent_id) => {
            let (forest, leftover) = insert_under(without, parent_id, entity);
            match leftover {
                // Target vanished between validation and application; keep
                // the entity where it was rather than dropping it.
                Some(entity) => {
                    tracing::debug!(
                        "move_entity: target {} not found, restoring {} in place",
                        parent_id,
                        id
                    );
                    add_entity(forest, entity, None)
                }
                None => forest,
            }
        }
    }
}

/// Depth-first search for the entity with `id`.
pub fn find_entity<'a, T: TreeEntity>(forest: &'a [T], id: &EntityId) -> Option<&'a T> {
    for node in forest {
        if node.id() == id {
            return Some(node);
        }
        if let Some(children) = node.children() {
            if let Some(found) = find_entity(children, id) {
                return Some(found);
            }
        }
    }
    None
}

pub fn contains<T: TreeEntity>(forest: &[T], id: &EntityId) -> bool {
    find_entity(forest, id).is_some()
}

/// Next free append-at-end position under `parent_id`: one past the current
/// maximum sibling position, or `0` for an empty sibling set. Tolerates the
/// gaps deletions leave behind.
///
/// When `parent_id` names a node that is not in this forest (flat leaf
/// collections referencing a parent in another collection), siblings are the
/// nodes carrying that same `parent_id` reference.
pub fn next_position<T: TreeEntity>(forest: &[T], parent_id: Option<&EntityId>) -> i64 {
    let max = match parent_id {
        None => forest.iter().map(|node| node.position()).max(),
        Some(parent_id) => match find_entity(forest, parent_id) {
            Some(parent) => parent
                .children()
                .and_then(|children| children.iter().map(|c| c.position()).max()),
            None => forest
                .iter()
                .filter(|node| node.parent_id() == Some(parent_id))
                .map(|node| node.position())
                .max(),
        },
    };
    max.map_or(0, |max| max + 1)
}

/// Ids of the current sibling group under `parent_id` (forest roots when
/// `None`), in display order. Feeding a permutation of this list to a
/// reorder is how callers renumber a full sibling set.
pub fn sibling_ids<T: TreeEntity>(forest: &[T], parent_id: Option<&EntityId>) -> Vec<EntityId> {
    let collect = |siblings: &[T]| {
        let mut siblings: Vec<&T> = siblings.iter().collect();
        siblings.sort_by(|a, b| {
            a.position()
                .cmp(&b.position())
                .then_with(|| a.label().cmp(b.label()))
        });
        siblings.into_iter().map(|node| node.id().clone()).collect()
    };
    match parent_id {
        None => collect(forest),
        Some(parent_id) => find_entity(forest, parent_id)
            .and_then(|parent| parent.children())
            .map(collect)
            .unwrap_or_default(),
    }
}

/// Sort every sibling group ascending by `position`, ties broken by label.
pub fn sort_forest<T: TreeEntity>(forest: &mut Vec<T>) {
    forest.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.label().cmp(b.label()))
    });
    for node in forest.iter_mut() {
        if let Some(children) = node.children_mut() {
            sort_forest(children);
        }
    }
}

/// Nest a flat, parent-keyed list of entities into a sorted forest.
///
/// Entities whose parent is absent from the list become roots alongside the
/// explicitly parentless ones only if their parent is `None`; orphans with a
/// dangling parent reference are dropped, mirroring how a store query scoped
/// to one subtree behaves.
pub fn build_forest<T: TreeEntity>(flat: Vec<T>) -> Vec<T> {
    fn level_of<T: TreeEntity>(flat: &[T], parent: Option<&EntityId>) -> Vec<T> {
        let mut level: Vec<T> = flat
            .iter()
            .filter(|entity| entity.parent_id() == parent)
            .cloned()
            .collect();
        level.sort_by(|a, b| {
            a.position()
                .cmp(&b.position())
                .then_with(|| a.label().cmp(b.label()))
        });
        for node in level.iter_mut() {
            let id = node.id().clone();
            if let Some(children) = node.ensure_children() {
                *children = level_of(flat, Some(&id));
            }
        }
        level
    }

    level_of(&flat, None)
}

/// Every entity whose parent chain passes through `parent_id`, flattened.
///
/// Matches on `parent_id` at every level rather than walking only nested
/// children, so it works identically for container forests (folders) and
/// flat leaf collections (notes referencing folder ids).
pub fn collect_descendants<T: TreeEntity>(forest: &[T], parent_id: &EntityId) -> Vec<T> {
    fn flatten_all<T: TreeEntity>(nodes: &[T], out: &mut Vec<T>) {
        for node in nodes {
            out.push(node.clone());
            if let Some(children) = node.children() {
                flatten_all(children, out);
            }
        }
    }

    fn walk<T: TreeEntity>(nodes: &[T], target: &EntityId, out: &mut Vec<T>) {
        for node in nodes {
            if node.parent_id() == Some(target) {
                out.push(node.clone());
                if let Some(children) = node.children() {
                    flatten_all(children, out);
                }
            } else if let Some(children) = node.children() {
                walk(children, target, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(forest, parent_id, &mut out);
    out
}

/// Ancestor chain of `id`, nearest parent first.
pub fn collect_ancestors<T: TreeEntity>(forest: &[T], id: &EntityId) -> Vec<T> {
    let mut out = Vec::new();
    let mut current = find_entity(forest, id).and_then(|node| node.parent_id().cloned());
    while let Some(parent_id) = current {
        let Some(parent) = find_entity(forest, &parent_id) else {
            break;
        };
        // Defensive stop on malformed chains.
        if out.iter().any(|seen: &T| seen.id() == parent.id()) {
            tracing::warn!("collect_ancestors: cycle in parent chain at {}", parent_id);
            break;
        }
        out.push(parent.clone());
        current = parent.parent_id().cloned();
    }
    out
}
