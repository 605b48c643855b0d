//! Thread-safe specialization cache.
//!
//! A single [`SpecializationCache`] is built for one render context on one
//! thread. When several contexts (or worker threads shading disjoint tiles)
//! must share compiled units, wrap the cache in a
//! [`SharedSpecializationCache`]: lookups and compilation are serialized by a
//! `parking_lot::Mutex`, and units are handed out as `Arc<CompiledUnit>` so
//! they can be invoked after the lock is released. An evicted unit stays
//! alive until its last `Arc` is dropped.

use std::sync::Arc;

use parking_lot::Mutex;

use super::cache::{CacheStats, SpecializationCache, UnitHandle};
use super::codegen::{CodeGenerator, UnitCompiler};
use super::unit::CompiledUnit;
use crate::errors::{RasterError, Result};
use crate::renderer::state::PipelineState;

/// Cloneable, `Send + Sync` handle to a shared cache.
pub struct SharedSpecializationCache<C: UnitCompiler = CodeGenerator> {
    inner: Arc<Mutex<SpecializationCache<C>>>,
}

impl<C: UnitCompiler> Clone for SharedSpecializationCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for SharedSpecializationCache<CodeGenerator> {
    fn default() -> Self {
        Self::new(SpecializationCache::new())
    }
}

impl<C: UnitCompiler> SharedSpecializationCache<C> {
    #[must_use]
    pub fn new(cache: SpecializationCache<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Returns the handle and unit for `state`, compiling it if needed.
    pub fn ensure_compiled(&self, state: &PipelineState) -> Result<(UnitHandle, Arc<CompiledUnit>)> {
        let mut cache = self.inner.lock();
        let handle = cache.ensure_compiled(state)?;
        let unit = cache
            .unit(handle)
            .cloned()
            .ok_or(RasterError::InvalidHandle("blend unit"))?;
        Ok((handle, unit))
    }

    /// Resolves a previously returned handle.
    #[must_use]
    pub fn unit(&self, handle: UnitHandle) -> Option<Arc<CompiledUnit>> {
        self.inner.lock().unit(handle).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Runs `f` with exclusive access to the underlying cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut SpecializationCache<C>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
