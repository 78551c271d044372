//! Folder Model
//!
//! Folders are the container entity of the hierarchy: a folder may hold
//! other folders (and, through the notes collection, notes that reference
//! it by `parent_id`). Nested children are materialized on the struct so a
//! forest of folders carries its full subtree shape.

use crate::models::entity::{EntityId, TreeEntity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A folder in the workspace hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: EntityId,

    pub name: String,

    /// `None` places the folder at the forest root.
    pub parent_id: Option<EntityId>,

    /// Sibling ordering key; unique among siblings, gaps allowed.
    pub position: i64,

    pub is_favorite: bool,

    pub is_public: bool,

    /// Set while an optimistic creation awaits store confirmation. The UI
    /// renders temp folders in a distinct state and blocks delete/drag on
    /// them until the creation resolves.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_temp: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Nested child folders, ordered by ascending `position`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Folder>,
}

/// Partial update for a [`Folder`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    /// `Some(None)` explicitly moves the folder to the forest root.
    pub parent_id: Option<Option<EntityId>>,
    pub position: Option<i64>,
    pub is_favorite: Option<bool>,
    pub is_public: Option<bool>,
    /// Replaces the children wholesale when present.
    pub children: Option<Vec<Folder>>,
}

impl FolderPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl TreeEntity for Folder {
    type Patch = FolderPatch;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn parent_id(&self) -> Option<&EntityId> {
        self.parent_id.as_ref()
    }

    fn set_parent_id(&mut self, parent_id: Option<EntityId>) {
        self.parent_id = parent_id;
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn is_temp(&self) -> bool {
        self.is_temp
    }

    fn set_temp(&mut self, is_temp: bool) {
        self.is_temp = is_temp;
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Option<&[Self]> {
        Some(&self.children)
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Self>> {
        Some(&mut self.children)
    }

    fn ensure_children(&mut self) -> Option<&mut Vec<Self>> {
        Some(&mut self.children)
    }

    fn new_entity(now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::Persisted(0),
            name: "New Folder".to_string(),
            parent_id: None,
            position: 0,
            is_favorite: false,
            is_public: false,
            is_temp: false,
            created_at: now,
            updated_at: now,
            children: Vec::new(),
        }
    }

    fn apply_patch(&mut self, patch: &FolderPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(parent_id) = &patch.parent_id {
            self.parent_id = parent_id.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(is_favorite) = patch.is_favorite {
            self.is_favorite = is_favorite;
        }
        if let Some(is_public) = patch.is_public {
            self.is_public = is_public;
        }
        if let Some(children) = &patch.children {
            self.children = children.clone();
        }
    }

    fn patch_position(position: i64) -> FolderPatch {
        FolderPatch {
            position: Some(position),
            ..FolderPatch::default()
        }
    }

    fn patch_field(field: &str, value: &str) -> Option<FolderPatch> {
        match field {
            "name" => Some(FolderPatch::name(value)),
            _ => None,
        }
    }
}
