//! 32-bit FNV-1a hasher.
//!
//! Deterministic across platforms and runs; pipeline state fingerprints are
//! fed through its [`Hasher`] impl.

use std::hash::Hasher;

/// FNV-1a 32-bit offset basis.
pub const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime.
pub const FNV32_PRIME: u32 = 0x0100_0193;

/// Incremental 32-bit FNV-1a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv32 {
    state: u32,
}

impl Default for Fnv32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv32 {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: FNV32_OFFSET_BASIS,
        }
    }

    /// Folds bytes into the state, one byte at a time.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= u32::from(b);
            self.state = self.state.wrapping_mul(FNV32_PRIME);
        }
    }

    #[inline]
    pub fn write_bool(&mut self, v: bool) {
        self.write_bytes(&[u8::from(v)]);
    }

    /// Current 32-bit digest.
    #[inline]
    #[must_use]
    pub const fn finish32(&self) -> u32 {
        self.state
    }

    /// One-shot hash of a byte slice.
    #[must_use]
    pub fn hash_bytes(bytes: &[u8]) -> u32 {
        let mut h = Self::new();
        h.write_bytes(bytes);
        h.finish32()
    }
}

impl Hasher for Fnv32 {
    #[inline]
    fn finish(&self) -> u64 {
        u64::from(self.state)
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.write_bytes(bytes);
    }

    // Explicit little-endian so fingerprints do not depend on the host.
    #[inline]
    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }
}
