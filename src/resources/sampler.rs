use serde::{Deserialize, Serialize};

/// Out-of-range coordinate handling, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    ClampToBorder,
    Repeat,
    MirroredRepeat,
    MirrorClampToEdge,
}

/// Texel filter applied along every sampled axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
    Cubic,
}

/// Filter between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MipmapFilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Sampler state. Plain value data; bound to a texture unit next to a view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSampler {
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: MipmapFilterMode,

    pub lod_bias: f32,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    /// Stored for the surrounding layer; sampling is isotropic.
    pub anisotropy_clamp: u16,

    /// Returned for every tap that falls outside a `ClampToBorder` axis.
    pub border_color: [f32; 4],
}

impl Default for TextureSampler {
    fn default() -> Self {
        Self {
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: MipmapFilterMode::Nearest,
            lod_bias: 0.0,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1000.0,
            anisotropy_clamp: 1,
            border_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl TextureSampler {
    /// Nearest filtering with clamp-to-edge on every axis.
    #[must_use]
    pub fn nearest() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Self::default()
        }
    }

    /// Sets the same address mode on all three axes.
    #[must_use]
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode_u = mode;
        self.address_mode_v = mode;
        self.address_mode_w = mode;
        self
    }

    /// Sets both the minification and magnification filters.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.mag_filter = filter;
        self.min_filter = filter;
        self
    }

    #[must_use]
    pub fn with_border_color(mut self, color: [f32; 4]) -> Self {
        self.border_color = color;
        self
    }

    #[inline]
    #[must_use]
    pub fn address_modes(&self) -> [AddressMode; 3] {
        [self.address_mode_u, self.address_mode_v, self.address_mode_w]
    }

    /// Filter used for a given level of detail: minification above zero.
    #[inline]
    #[must_use]
    pub fn filter_for_lod(&self, lod: f32) -> FilterMode {
        if lod > 0.0 {
            self.min_filter
        } else {
            self.mag_filter
        }
    }
}
