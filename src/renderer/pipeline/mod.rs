//! Blend Unit Specialization
//!
//! - [`fingerprint`]: 32-bit FNV fingerprint of the code-affecting state
//! - [`codegen`]: IR construction, verification and lowering
//! - [`unit`]: compiled, executable blend/write units
//! - [`cache`]: bounded LRU cache of units keyed by pipeline state
//! - [`shared`]: mutex-guarded cache for use across threads

pub mod cache;
pub mod codegen;
pub mod fingerprint;
pub mod shared;
pub mod unit;

pub use cache::{CacheStats, SpecializationCache, UnitHandle};
pub use codegen::{CodeGenerator, UnitCompiler};
pub use fingerprint::StateFingerprint;
pub use shared::SharedSpecializationCache;
pub use unit::{CompiledUnit, Rgba};
