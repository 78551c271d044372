//! Note Model
//!
//! Notes are the leaf entity of the hierarchy: they never hold children and
//! live in a flat forest of their own, referencing their owning folder by
//! `parent_id`. Folder membership of a note is therefore just a parent
//! reference; the note engine instance and the folder engine instance never
//! share state.

use crate::models::entity::{EntityId, TreeEntity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A note owned by at most one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: EntityId,

    pub title: String,

    pub content: String,

    /// Owning folder; `None` for notes outside any folder.
    pub parent_id: Option<EntityId>,

    /// Ordering key among the notes of the same folder.
    pub position: i64,

    pub is_pinned: bool,

    /// Set while an optimistic creation awaits store confirmation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_temp: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Partial update for a [`Note`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` explicitly detaches the note from its folder.
    pub parent_id: Option<Option<EntityId>>,
    pub position: Option<i64>,
    pub is_pinned: Option<bool>,
}

impl NotePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

impl TreeEntity for Note {
    type Patch = NotePatch;

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
        &self.title
    }

    fn new_entity(now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::Persisted(0),
            title: "Untitled Note".to_string(),
            content: String::new(),
            parent_id: None,
            position: 0,
            is_pinned: false,
            is_temp: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &NotePatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(parent_id) = &patch.parent_id {
            self.parent_id = parent_id.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(is_pinned) = patch.is_pinned {
            self.is_pinned = is_pinned;
        }
    }

    fn patch_position(position: i64) -> NotePatch {
        NotePatch {
            position: Some(position),
            ..NotePatch::default()
        }
    }

    fn patch_field(field: &str, value: &str) -> Option<NotePatch> {
        match field {
            "title" => Some(NotePatch::title(value)),
            "content" => Some(NotePatch::content(value)),
            _ => None,
        }
    }
}
