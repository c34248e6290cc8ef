//! Entity resolution: turning an entity reference into its session data.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use el_core::{Entity, EntityLevel, SessionData};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("entity {level}:{id} not found")]
    NotFound { id: String, level: EntityLevel },

    #[error("entity {level}:{id} has no snapshots")]
    Empty { id: String, level: EntityLevel },
}

impl ResolveError {
    pub fn not_found(entity: &Entity) -> Self {
        ResolveError::NotFound {
            id: entity.id.clone(),
            level: entity.level,
        }
    }

    pub fn empty(entity: &Entity) -> Self {
        ResolveError::Empty {
            id: entity.id.clone(),
            level: entity.level,
        }
    }
}

/// Source of session data for entities.
pub trait EntityResolver {
    /// Resolve an entity to time-ordered session data with at least one snapshot.
    fn resolve(&self, entity: &Entity) -> Result<Arc<SessionData>, ResolveError>;
}

impl<R: EntityResolver + ?Sized> EntityResolver for &R {
    fn resolve(&self, entity: &Entity) -> Result<Arc<SessionData>, ResolveError> {
        (**self).resolve(entity)
    }
}

/// In-memory resolver over preloaded sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    entities: HashMap<Entity, Arc<SessionData>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity, data: SessionData) {
        self.entities.insert(entity, Arc::new(data));
    }

    pub fn with(mut self, entity: Entity, data: SessionData) -> Self {
        self.insert(entity, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityResolver for MemoryResolver {
    fn resolve(&self, entity: &Entity) -> Result<Arc<SessionData>, ResolveError> {
        let data = self
            .entities
            .get(entity)
            .ok_or_else(|| ResolveError::not_found(entity))?;
        if data.is_empty() {
            return Err(ResolveError::empty(entity));
        }
        Ok(Arc::clone(data))
    }
}

/// Memoizes successful resolutions keyed by `(id, level)`.
///
/// Failures are not cached, so an entity that appears later is picked up.
#[derive(Debug)]
pub struct CachedResolver<R> {
    inner: R,
    cache: RefCell<HashMap<Entity, Arc<SessionData>>>,
}

impl<R: EntityResolver> CachedResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: EntityResolver> EntityResolver for CachedResolver<R> {
    fn resolve(&self, entity: &Entity) -> Result<Arc<SessionData>, ResolveError> {
        if let Some(hit) = self.cache.borrow().get(entity) {
            debug!(%entity, "resolver cache hit");
            return Ok(Arc::clone(hit));
        }
        let data = self.inner.resolve(entity)?;
        self.cache
            .borrow_mut()
            .insert(entity.clone(), Arc::clone(&data));
        Ok(data)
    }
}
