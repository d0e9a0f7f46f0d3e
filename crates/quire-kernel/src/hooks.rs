//! Named deletion hooks.
//!
//! Hooks are registered by name at startup; configuration picks which names
//! run on delete. A hook receives only the id of what was deleted. Failures
//! (errors, panics, unknown names) are logged and never stop the delete.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use quire_types::{FileId, InodeId};
use thiserror::Error;

/// The entity a delete removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    File(FileId),
    Inode(InodeId),
}

impl fmt::Display for Deleted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deleted::File(id) => write!(f, "file {id}"),
            Deleted::Inode(id) => write!(f, "inode {id}"),
        }
    }
}

/// Error reported by a hook.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A deletion callback.
pub type DeleteHook = Arc<dyn Fn(Deleted) -> Result<(), HookError> + Send + Sync>;

/// Table of named callbacks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<String, DeleteHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` under `name`, replacing any earlier one.
    pub fn register<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Deleted) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    /// Run the hooks named in `selected`, in order. Returns how many
    /// completed successfully.
    pub fn run_delete(&self, selected: &[String], deleted: Deleted) -> usize {
        let mut ok = 0;
        for name in selected {
            let Some(hook) = self.hooks.get(name) else {
                tracing::error!(hook = %name, "no such hook registered");
                continue;
            };

            tracing::info!(hook = %name, target = %deleted, "running delete hook");
            match catch_unwind(AssertUnwindSafe(|| hook(deleted))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    tracing::error!(hook = %name, target = %deleted, error = %e, "delete hook failed");
                }
                Err(_) => {
                    tracing::error!(hook = %name, target = %deleted, "delete hook panicked");
                }
            }
        }
        ok
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
