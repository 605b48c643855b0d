//! Utility Module
//!
//! - [`fnv`]: 32-bit FNV-1a hashing used for pipeline state fingerprints
//!
//! ```rust,ignore
//! use myth_raster::utils::Fnv32;
//!
//! let mut h = Fnv32::new();
//! h.write_u32(7);
//! let fp = h.finish32();
//! ```

pub mod fnv;

pub use fnv::Fnv32;
