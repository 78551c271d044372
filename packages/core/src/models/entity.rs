//! Entity Identity and the `TreeEntity` Trait
//!
//! Every entity kind that participates in a hierarchy (folders, notes, and
//! any future tree-shaped collection) implements [`TreeEntity`]. The engine
//! and the tree functions are generic over this trait, so the optimistic
//! CRUD machinery is written once and shared across collections.
//!
//! # Two id spaces
//!
//! Persisted entities carry numeric ids assigned by the backing store.
//! Optimistically created entities carry temporary string ids until the
//! store confirms the creation, at which point the temporary node is swapped
//! for the persisted one. [`EntityId`] models both spaces in one type so a
//! forest can hold confirmed and in-flight nodes side by side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local sequence that disambiguates temp ids minted within the
/// same millisecond.
static TEMP_ID_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identifier for a tree entity.
///
/// Serializes untagged: persisted ids round-trip as JSON numbers, temporary
/// ids as JSON strings, matching the wire shape the UI layer expects.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Durable id assigned by the backing store.
    Persisted(i64),
    /// Temporary id of a not-yet-confirmed creation (`"<prefix>-<millis>-<seq>"`).
    Temp(String),
}

impl EntityId {
    /// Mint a fresh temporary id with the given prefix.
    ///
    /// A temporary id is used exactly once: after the store confirms the
    /// creation it is replaced by the persisted id and never reused.
    pub fn temp(prefix: &str) -> Self {
        let seq = TEMP_ID_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::Temp(format!(
            "{}-{}-{}",
            prefix,
            Utc::now().timestamp_millis(),
            seq
        ))
    }

    /// Whether this id belongs to an unconfirmed creation.
    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// The numeric store id, if this id is persisted.
    pub fn as_persisted(&self) -> Option<i64> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{}", id),
            Self::Temp(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Persisted(id)
    }
}

/// Shape shared by every entity kind that participates in a hierarchy.
///
/// Implementors provide field access plus a partial-update [`Patch`] type;
/// the tree functions and [`CrudEngine`](crate::engine::CrudEngine) supply
/// all collection behavior on top of this surface.
///
/// Container types (folders) expose their nested children through
/// [`children`](TreeEntity::children) and friends; leaf types (notes) keep
/// the default implementations, which report no child storage at all.
pub trait TreeEntity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Partial update applied by `update` operations. Every field is
    /// optional; absent fields leave the entity untouched.
    type Patch: Clone + fmt::Debug + Default + Send + Sync + 'static;

    fn id(&self) -> &EntityId;
    fn set_id(&mut self, id: EntityId);

    /// `None` means the entity sits at the forest root.
    fn parent_id(&self) -> Option<&EntityId>;
    fn set_parent_id(&mut self, parent_id: Option<EntityId>);

    /// Integer ordering key, unique among siblings, gaps allowed.
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);

    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Refresh `updated_at`; called on every mutation.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Whether this node is an unconfirmed optimistic creation.
    fn is_temp(&self) -> bool;
    fn set_temp(&mut self, is_temp: bool);

    /// Secondary sort key breaking `position` ties (name or title).
    fn label(&self) -> &str;

    /// Nested children, `None` for leaf types.
    fn children(&self) -> Option<&[Self]> {
        None
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        None
    }

    /// Child storage for container types, `None` for leaf types. Containers
    /// return their children vec (creating it if the type models absence).
    fn ensure_children(&mut self) -> Option<&mut Vec<Self>> {
        None
    }

    /// Entity populated with default values, used as the base of an
    /// optimistic creation before the caller's patch is merged in.
    fn new_entity(now: DateTime<Utc>) -> Self;

    /// Merge a partial patch into this entity. Children are only replaced
    /// when the patch explicitly carries a children value.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Patch that sets only `position`; used by the reorder policy.
    fn patch_position(position: i64) -> Self::Patch;

    /// Patch that sets the named text field, or `None` if the entity has no
    /// such editable field. Used by the editing-session commit path.
    fn patch_field(field: &str, value: &str) -> Option<Self::Patch>;
}
