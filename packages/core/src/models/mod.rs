//! Data Models
//!
//! This module contains the entity types managed by the CRUD engine:
//!
//! - `EntityId` - persisted (numeric) and temporary (string) id spaces
//! - `TreeEntity` - the trait every hierarchical entity kind implements
//! - `Folder` - container entity with nested children
//! - `Note` - leaf entity referencing its owning folder
//!
//! All persistence concerns live in the `store` module; models stay plain
//! data plus the trait surface the engine operates through.

mod entity;
mod folder;
mod note;

pub use entity::{EntityId, TreeEntity};
pub use folder::{Folder, FolderPatch};
pub use note::{Note, NotePatch};
