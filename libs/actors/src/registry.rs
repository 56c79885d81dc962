//! Actor Registry
//!
//! Identity to actor lookup used by the scheduler on every dispatch.
//! Written only while actors register, so it is read-mostly once a run is
//! under way; a `parking_lot::RwLock` gives registration made during a run
//! the reader/writer discipline it needs without ever being held across an
//! await point.

use crate::actor::ActorRef;
use crate::error::{KernelError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Unique actor identifier, stable for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Arc<str>);

impl ActorId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&ActorId> for ActorId {
    fn from(id: &ActorId) -> Self {
        id.clone()
    }
}

/// Insertion-ordered identity table
#[derive(Debug, Default)]
pub struct ActorRegistry {
    inner: RwLock<RegistryTable>,
}

#[derive(Debug, Default)]
struct RegistryTable {
    index: HashMap<ActorId, usize>,
    actors: Vec<ActorRef>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor under its identity
    ///
    /// Fails with `DuplicateIdentity` and leaves the table untouched if the
    /// identity is already present.
    pub fn register(&self, actor: ActorRef) -> Result<()> {
        let mut table = self.inner.write();
        if table.index.contains_key(actor.id()) {
            tracing::warn!(actor_id = %actor.id(), "Rejected duplicate actor registration");
            return Err(KernelError::DuplicateIdentity(actor.id().clone()));
        }

        tracing::debug!(actor_id = %actor.id(), position = table.actors.len(), "Registering actor");
        let position = table.actors.len();
        table.index.insert(actor.id().clone(), position);
        table.actors.push(actor);
        Ok(())
    }

    /// Find an actor; absence is a routing failure for the caller to report
    pub fn lookup(&self, id: &ActorId) -> Option<ActorRef> {
        let table = self.inner.read();
        table
            .index
            .get(id)
            .map(|&position| table.actors[position].clone())
    }

    /// Check if actor exists
    pub fn contains(&self, id: &ActorId) -> bool {
        self.inner.read().index.contains_key(id)
    }

    /// Get total actor count
    pub fn len(&self) -> usize {
        self.inner.read().actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities in registration order
    pub fn ids(&self) -> Vec<ActorId> {
        self.inner
            .read()
            .actors
            .iter()
            .map(|actor| actor.id().clone())
            .collect()
    }

    /// Registered actors in registration order
    pub fn actors(&self) -> Vec<ActorRef> {
        self.inner.read().actors.clone()
    }

    /// Undo a registration whose actor never came up
    pub(crate) fn remove(&self, id: &ActorId) -> Option<ActorRef> {
        let mut table = self.inner.write();
        let position = table.index.remove(id)?;
        let removed = table.actors.remove(position);
        for slot in table.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }
}
