//! Ports through which the engine talks to the chat host.
//!
//! The host owns the live preference object, the theme/background accessors
//! and the notion of which conversation and persona are active. The engine
//! only ever reads or writes individual keys; it never walks preference values
//! wholesale.

use serde_json::Value;
use thiserror::Error;

use crate::registry::discovery::DiscoveredControl;
use crate::registry::{FieldEffect, SpecialKey};
use crate::snapshot::Background;
use crate::storage::{Scope, ScopeKind};

pub mod memory;

pub use memory::MemoryHost;

pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host field `{key}` rejected value: {message}")]
    FieldRejected { key: String, message: String },
    #[error("host accessor unavailable: {0}")]
    Unavailable(String),
}

/// Live key-value preference object of the host.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> HostResult<()>;
    fn contains(&self, key: &str) -> bool;
    /// Key names only, in the host's enumeration order.
    fn keys(&self) -> Vec<String>;
}

/// Dedicated accessors for fields that do not live in the preference object,
/// plus the host-side refresh callbacks.
pub trait HostAccessors {
    fn active_theme(&self) -> Option<String>;
    fn set_active_theme(&mut self, name: &str) -> HostResult<()>;
    fn custom_css(&self) -> String;
    fn set_custom_css(&mut self, css: &str) -> HostResult<()>;
    fn background(&self) -> Option<Background>;
    fn set_background(&mut self, background: &Background) -> HostResult<()>;
    fn special_value(&self, key: SpecialKey) -> Option<Value>;
    fn set_special_value(&mut self, key: SpecialKey, value: &Value) -> HostResult<()>;

    /// Run the host callback tied to a field after it was written.
    fn field_applied(&mut self, _effect: FieldEffect) {}

    /// Recompute every derived piece of UI state. Called once per apply.
    fn apply_all(&mut self);
}

pub trait ActiveScopes {
    fn active_conversation(&self) -> Option<String>;
    fn active_persona(&self) -> Option<String>;

    /// Display name for the active scope of `kind`, when the host has one.
    fn active_scope_name(&self, _kind: ScopeKind) -> Option<String> {
        None
    }

    fn active_scope(&self, kind: ScopeKind) -> Option<Scope> {
        let id = match kind {
            ScopeKind::Conversation => self.active_conversation(),
            ScopeKind::Persona => self.active_persona(),
        }
        .filter(|id| !id.is_empty())?;
        Some(Scope { kind, id })
    }
}

/// Enumerates the configuration controls the host currently renders.
pub trait FieldFeed {
    fn discover(&self) -> Vec<DiscoveredControl>;
}

pub trait Host: PreferenceStore + HostAccessors + ActiveScopes + FieldFeed {}

impl<T> Host for T where T: PreferenceStore + HostAccessors + ActiveScopes + FieldFeed {}
