//! Rasterizer Settings
//!
//! Tunables for a [`RenderContext`](crate::renderer::RenderContext).
//!
//! ```rust,ignore
//! use myth_raster::RasterSettings;
//!
//! let settings = RasterSettings {
//!     cache_capacity: 256,
//!     ..Default::default()
//! };
//! settings.validate()?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{RasterError, Result};

/// Default number of compiled blend units kept alive.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default number of hash buckets in the specialization cache.
pub const DEFAULT_CACHE_BUCKETS: usize = 512;

/// Default number of texture units.
pub const DEFAULT_TEXTURE_UNITS: usize = 16;

/// Context-wide configuration.
///
/// All fields have serde defaults so partial configuration files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    /// Maximum number of compiled units before the least recently used one is
    /// evicted. Must be at least 1.
    pub cache_capacity: usize,
    /// Number of fingerprint buckets. Must be at least 1.
    pub cache_buckets: usize,
    /// Number of texture units exposed to fragment programs.
    pub texture_units: usize,
    /// Emit a listing of every generated blend program at `trace` level.
    pub trace_generated_code: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_buckets: DEFAULT_CACHE_BUCKETS,
            texture_units: DEFAULT_TEXTURE_UNITS,
            trace_generated_code: false,
        }
    }
}

impl RasterSettings {
    /// Checks the settings for values the context cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(RasterError::InvalidSettings(
                "cache_capacity must be at least 1".into(),
            ));
        }
        if self.cache_buckets == 0 {
            return Err(RasterError::InvalidSettings(
                "cache_buckets must be at least 1".into(),
            ));
        }
        if self.texture_units == 0 {
            return Err(RasterError::InvalidSettings(
                "texture_units must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
