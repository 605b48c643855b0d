//! Specialization Cache
//!
//! Owns every [`CompiledUnit`] and guarantees at most one unit per distinct
//! [`PipelineState`]. Units are addressed through generational
//! [`UnitHandle`]s, so a handle to an evicted unit simply stops resolving.
//!
//! # Layout
//!
//! ```text
//!  buckets[fingerprint % N]          entries (SlotMap arena)
//!  ┌───┐                             ┌──────────────────────────────┐
//!  │ 0 │──▶ [h3, h7]                 │ h3: hash, state, unit, ◀─▶   │
//!  │ 1 │──▶ []                       │ h7: hash, state, unit, ◀─▶   │
//!  │ … │                             └──────────────────────────────┘
//!  └───┘        recency: head (least recent) ◀──▶ … ◀──▶ tail (most recent)
//! ```
//!
//! - **Lookup** hashes the state, scans its bucket and compares the
//!   fingerprint and then every field.
//! - **Hit** moves the entry to the recency tail in O(1) and never allocates.
//! - **Miss** compiles first and links the entry only on success; a failed
//!   compilation or allocation leaves the cache untouched.
//! - **Eviction** happens when the entry count exceeds the capacity: the
//!   recency head is unlinked, removed from its bucket and its code buffer
//!   released.

use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use super::codegen::{CodeGenerator, UnitCompiler};
use super::fingerprint::StateFingerprint;
use super::unit::CompiledUnit;
use crate::errors::{RasterError, Result};
use crate::renderer::state::PipelineState;
use crate::settings::{DEFAULT_CACHE_BUCKETS, DEFAULT_CACHE_CAPACITY, RasterSettings};

new_key_type! {
    /// Handle to a cached [`CompiledUnit`].
    ///
    /// Returned by [`SpecializationCache::ensure_compiled`]; resolve it with
    /// [`SpecializationCache::unit`].
    pub struct UnitHandle;
}

struct CacheEntry {
    hash: u32,
    state: PipelineState,
    unit: Arc<CompiledUnit>,
    prev: Option<UnitHandle>,
    next: Option<UnitHandle>,
}

/// Lookup counters since creation or the last [`SpecializationCache::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded, least-recently-used cache of compiled blend units.
pub struct SpecializationCache<C: UnitCompiler = CodeGenerator> {
    compiler: C,
    entries: SlotMap<UnitHandle, CacheEntry>,
    buckets: Box<[SmallVec<[UnitHandle; 2]>]>,
    head: Option<UnitHandle>,
    tail: Option<UnitHandle>,
    capacity: usize,
    stats: CacheStats,
}

impl Default for SpecializationCache<CodeGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecializationCache<CodeGenerator> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_compiler(
            CodeGenerator::new(),
            DEFAULT_CACHE_CAPACITY,
            DEFAULT_CACHE_BUCKETS,
        )
    }

    pub fn from_settings(settings: &RasterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::with_compiler(
            CodeGenerator::new().with_trace_listing(settings.trace_generated_code),
            settings.cache_capacity,
            settings.cache_buckets,
        ))
    }
}

impl<C: UnitCompiler> SpecializationCache<C> {
    /// Creates a cache around `compiler`. Zero capacity or bucket counts are
    /// raised to one.
    pub fn with_compiler(compiler: C, capacity: usize, buckets: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            compiler,
            entries: SlotMap::with_capacity_and_key(capacity.saturating_add(1).min(4096)),
            buckets: vec![SmallVec::new(); buckets.max(1)].into_boxed_slice(),
            head: None,
            tail: None,
            capacity,
            stats: CacheStats::default(),
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Returns the unit handle for `state`, compiling it on first use.
    ///
    /// Repeated calls with an equal state return the same handle for as long
    /// as the unit stays cached.
    pub fn ensure_compiled(&mut self, state: &PipelineState) -> Result<UnitHandle> {
        let hash = state.fingerprint();
        if let Some(handle) = self.find(hash, state) {
            self.stats.hits += 1;
            self.touch(handle);
            return Ok(handle);
        }

        self.stats.misses += 1;
        let unit = match self.compiler.compile(state) {
            Ok(unit) => unit,
            Err(err) => {
                log::warn!("Blend unit compilation failed for {hash:#010x}: {err}");
                return Err(err);
            }
        };

        let bucket = self.bucket_index(hash);
        self.entries
            .try_reserve(1)
            .map_err(|_| RasterError::OutOfMemory {
                what: "specialization cache entry",
                bytes: std::mem::size_of::<CacheEntry>(),
            })?;
        self.buckets[bucket]
            .try_reserve(1)
            .map_err(|_| RasterError::OutOfMemory {
                what: "specialization cache bucket",
                bytes: std::mem::size_of::<UnitHandle>(),
            })?;

        let handle = self.entries.insert(CacheEntry {
            hash,
            state: *state,
            unit: Arc::new(unit),
            prev: None,
            next: None,
        });
        self.buckets[bucket].push(handle);
        self.push_back(handle);

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }
        Ok(handle)
    }

    /// Finds the handle for `state` without compiling or touching recency.
    #[must_use]
    pub fn lookup(&self, state: &PipelineState) -> Option<UnitHandle> {
        self.find(state.fingerprint(), state)
    }

    /// Resolves a handle; `None` once the unit was evicted.
    #[inline]
    #[must_use]
    pub fn unit(&self, handle: UnitHandle) -> Option<&Arc<CompiledUnit>> {
        self.entries.get(handle).map(|e| &e.unit)
    }

    // ── Introspection ────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Handles from least to most recently used.
    pub fn recency_order(&self) -> impl Iterator<Item = UnitHandle> + '_ {
        std::iter::successors(self.head, |h| self.entries.get(*h).and_then(|e| e.next))
    }

    /// Drops every unit and resets the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.head = None;
        self.tail = None;
        self.stats = CacheStats::default();
    }

    // ── Internals ────────────────────────────────────────────────────────────

    #[inline]
    fn bucket_index(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    fn find(&self, hash: u32, state: &PipelineState) -> Option<UnitHandle> {
        self.buckets[self.bucket_index(hash)]
            .iter()
            .copied()
            .find(|&h| {
                self.entries
                    .get(h)
                    .is_some_and(|e| e.hash == hash && e.state == *state)
            })
    }

    fn touch(&mut self, handle: UnitHandle) {
        if self.tail != Some(handle) {
            self.unlink(handle);
            self.push_back(handle);
        }
    }

    fn unlink(&mut self, handle: UnitHandle) {
        let Some(entry) = self.entries.get_mut(handle) else {
            return;
        };
        let (prev, next) = (entry.prev.take(), entry.next.take());
        match prev.and_then(|p| self.entries.get_mut(p)) {
            Some(p) => p.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.entries.get_mut(n)) {
            Some(n) => n.prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_back(&mut self, handle: UnitHandle) {
        let old_tail = self.tail;
        if let Some(entry) = self.entries.get_mut(handle) {
            entry.prev = old_tail;
            entry.next = None;
        }
        match old_tail.and_then(|t| self.entries.get_mut(t)) {
            Some(t) => t.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
    }

    fn evict_oldest(&mut self) {
        let Some(oldest) = self.head else {
            return;
        };
        self.unlink(oldest);
        if let Some(entry) = self.entries.remove(oldest) {
            let bucket = self.bucket_index(entry.hash);
            if let Some(pos) = self.buckets[bucket].iter().position(|&h| h == oldest) {
                self.buckets[bucket].swap_remove(pos);
            }
            self.stats.evictions += 1;
            log::debug!(
                "Evicted blend unit {:#010x} ({} bytes of code)",
                entry.hash,
                entry.unit.code_size()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::state::{BlendAttachmentState, BlendFactor};

    fn state_with(src: BlendFactor) -> PipelineState {
        PipelineState {
            attachment: BlendAttachmentState {
                enable: true,
                src_rgb: src,
                ..BlendAttachmentState::ALPHA_BLENDING
            },
            blend_enabled: true,
            depth_write: false,
        }
    }

    #[test]
    fn test_recency_list_tracks_touches() {
        let mut cache = SpecializationCache::new();
        let a = cache.ensure_compiled(&state_with(BlendFactor::One)).unwrap();
        let b = cache.ensure_compiled(&state_with(BlendFactor::Zero)).unwrap();
        let c = cache.ensure_compiled(&state_with(BlendFactor::SrcColor)).unwrap();
        assert_eq!(cache.recency_order().collect::<Vec<_>>(), vec![a, b, c]);

        cache.ensure_compiled(&state_with(BlendFactor::One)).unwrap();
        assert_eq!(cache.recency_order().collect::<Vec<_>>(), vec![b, c, a]);

        cache.ensure_compiled(&state_with(BlendFactor::SrcColor)).unwrap();
        assert_eq!(cache.recency_order().collect::<Vec<_>>(), vec![b, a, c]);
    }

    #[test]
    fn test_single_bucket_still_distinguishes_states() {
        let mut cache = SpecializationCache::with_compiler(CodeGenerator::new(), 16, 1);
        let a = cache.ensure_compiled(&state_with(BlendFactor::One)).unwrap();
        let b = cache.ensure_compiled(&state_with(BlendFactor::Zero)).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.lookup(&state_with(BlendFactor::One)), Some(a));
        assert_eq!(cache.buckets[0].len(), 2);
    }

    #[test]
    fn test_misses_reuse_evicted_slots() {
        let mut cache = SpecializationCache::with_compiler(CodeGenerator::new(), 2, 4);
        let slots = cache.entries.capacity();
        for src in BlendFactor::ALL {
            cache.ensure_compiled(&state_with(*src)).unwrap();
            assert!(cache.len() <= 2);
            assert_eq!(cache.entries.capacity(), slots);
        }
        assert_eq!(cache.stats().evictions, BlendFactor::ALL.len() as u64 - 2);
    }

    #[test]
    fn test_capacity_one_keeps_latest() {
        let mut cache = SpecializationCache::with_compiler(CodeGenerator::new(), 1, 4);
        let a = cache.ensure_compiled(&state_with(BlendFactor::One)).unwrap();
        let b = cache.ensure_compiled(&state_with(BlendFactor::Zero)).unwrap();
        assert!(cache.unit(a).is_none());
        assert!(cache.unit(b).is_some());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.recency_order().collect::<Vec<_>>(), vec![b]);
    }
}
