//! Engine Configuration
//!
//! One `EngineConfig` per entity collection, constructed explicitly and
//! passed into the engine at build time. There is no ambient global state;
//! an embedder wires a folders engine and a notes engine independently,
//! each with its own store adapter and hooks.

use crate::engine::error::{EngineError, Operation};
use crate::models::TreeEntity;
use std::fmt;

/// Predicate run against the fully patched entity before an update is
/// accepted. Returning `false` turns the update into a silent no-op.
pub type ValidationRule<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Called after a store-confirmed mutation, with the confirmed entity.
pub type SuccessHook<T> = Box<dyn Fn(Operation, &T) + Send + Sync>;

/// Called after rollback completes and before the error propagates, with
/// the entity as it looked when the failure hit (the temp entity for a
/// failed create).
pub type ErrorHook<T> = Box<dyn Fn(Operation, &EngineError, Option<&T>) + Send + Sync>;

/// Per-collection engine configuration.
pub struct EngineConfig<T: TreeEntity> {
    /// Human-readable collection name used in log lines ("folder", "note").
    pub entity_name: String,
    /// Prefix of temporary ids minted for optimistic creations.
    pub temp_id_prefix: String,
    pub validation_rule: Option<ValidationRule<T>>,
    pub on_success: Option<SuccessHook<T>>,
    pub on_error: Option<ErrorHook<T>>,
}

impl<T: TreeEntity> EngineConfig<T> {
    pub fn new(entity_name: impl Into<String>, temp_id_prefix: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            temp_id_prefix: temp_id_prefix.into(),
            validation_rule: None,
            on_success: None,
            on_error: None,
        }
    }

    pub fn with_validation_rule(mut self, rule: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.validation_rule = Some(Box::new(rule));
        self
    }

    pub fn with_on_success(mut self, hook: impl Fn(Operation, &T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn with_on_error(
        mut self,
        hook: impl Fn(Operation, &EngineError, Option<&T>) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

impl<T: TreeEntity> fmt::Debug for EngineConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("entity_name", &self.entity_name)
            .field("temp_id_prefix", &self.temp_id_prefix)
            .field("validation_rule", &self.validation_rule.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
