//! Views and Surfaces
//!
//! Both are non-owning references into an [`Image`]:
//!
//! - [`ImageView`]: sampled through a texture unit; selects a level/layer
//!   range, may reinterpret the format (same texel size) and swizzles the
//!   fetched channels.
//! - [`Surface`]: render target; one mip level of one layer range.

use serde::{Deserialize, Serialize};

use super::ImageId;
use super::format::Format;
use super::image::Image;
use crate::errors::{RasterError, Result};

/// Source of one output channel of a sampled color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Swizzle {
    R,
    G,
    B,
    A,
    Zero,
    One,
}

impl Swizzle {
    pub const IDENTITY: [Swizzle; 4] = [Self::R, Self::G, Self::B, Self::A];

    /// Selects the channel from `texel`; channel sources are clamped to [0, 1].
    #[inline]
    #[must_use]
    pub fn select(self, texel: [f32; 4]) -> f32 {
        match self {
            Self::R => texel[0].clamp(0.0, 1.0),
            Self::G => texel[1].clamp(0.0, 1.0),
            Self::B => texel[2].clamp(0.0, 1.0),
            Self::A => texel[3].clamp(0.0, 1.0),
            Self::Zero => 0.0,
            Self::One => 1.0,
        }
    }
}

/// Creation parameters of an [`ImageView`]. `None` format keeps the image's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageViewDesc {
    pub format: Option<Format>,
    pub base_level: u32,
    pub level_count: Option<u32>,
    pub base_layer: u32,
    pub layer_count: Option<u32>,
    pub swizzle: [Swizzle; 4],
}

impl Default for ImageViewDesc {
    fn default() -> Self {
        Self {
            format: None,
            base_level: 0,
            level_count: None,
            base_layer: 0,
            layer_count: None,
            swizzle: Swizzle::IDENTITY,
        }
    }
}

/// Validated view of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageView {
    pub image: ImageId,
    pub format: Format,
    pub min_level: u32,
    pub num_levels: u32,
    pub min_layer: u32,
    pub num_layers: u32,
    pub swizzle: [Swizzle; 4],
}

impl ImageView {
    /// Resolves `desc` against `source`.
    pub fn new(image: ImageId, source: &Image, desc: &ImageViewDesc) -> Result<Self> {
        let (levels, layers) = (source.levels(), source.layers());
        let num_levels = desc
            .level_count
            .unwrap_or_else(|| levels.saturating_sub(desc.base_level));
        let num_layers = desc
            .layer_count
            .unwrap_or_else(|| layers.saturating_sub(desc.base_layer));
        if !range_fits(desc.base_level, num_levels, levels) {
            return Err(RasterError::InvalidImage(format!(
                "view of {num_levels} levels from {} outside image with {levels} levels",
                desc.base_level
            )));
        }
        if !range_fits(desc.base_layer, num_layers, layers) {
            return Err(RasterError::InvalidImage(format!(
                "view of {num_layers} layers from {} outside image with {layers} layers",
                desc.base_layer
            )));
        }

        let format = desc.format.unwrap_or(source.format());
        let compatible = format.stride() == source.format().stride()
            && format.is_compressed() == source.format().is_compressed();
        if !compatible {
            return Err(RasterError::IncompatibleViewFormat {
                image: source.format(),
                view: format,
            });
        }
        if !source.image_type().supports(format) {
            return Err(RasterError::UnsupportedFetch {
                format,
                image_type: source.image_type(),
            });
        }

        Ok(Self {
            image,
            format,
            min_level: desc.base_level,
            num_levels,
            min_layer: desc.base_layer,
            num_layers,
            swizzle: desc.swizzle,
        })
    }
}

/// Non-empty `base..base + count` within `0..total`.
#[inline]
fn range_fits(base: u32, count: u32, total: u32) -> bool {
    count > 0 && base.checked_add(count).is_some_and(|end| end <= total)
}

/// Render target: one level of an image, writing to `layer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Surface {
    pub image: ImageId,
    pub format: Format,
    pub level: u32,
    pub layer: u32,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(image: ImageId, source: &Image, level: u32, layer: u32) -> Result<Self> {
        if level >= source.levels() || layer >= source.layers() {
            return Err(RasterError::InvalidImage(format!(
                "surface level {level} layer {layer} outside image"
            )));
        }
        let extent = source.extent(level);
        Ok(Self {
            image,
            format: source.format(),
            level,
            layer,
            width: extent.x,
            height: extent.y,
        })
    }

    /// Row-major texel coordinate of window position `(x, y)`.
    ///
    /// Window y grows upward while rows are stored top-down, so the row is
    /// flipped.
    #[inline]
    #[must_use]
    pub fn texel_coord(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        (x < self.width && y < self.height).then(|| (x, self.height - 1 - y))
    }
}
