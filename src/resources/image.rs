//! Images
//!
//! An [`Image`] owns the texel storage of every mip level and array layer.
//! Storage is one contiguous byte buffer laid out level-major:
//!
//! ```text
//! [ level 0: layer 0 | layer 1 | … ][ level 1: layer 0 | layer 1 | … ] …
//! ```
//!
//! Within a layer, rows run top to bottom with texels (or 4×4 blocks for
//! compressed formats) packed without padding; 3D levels store their slices
//! consecutively.

use bytemuck::Pod;
use glam::UVec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::format::Format;
use crate::errors::{RasterError, Result};

/// Dimensionality and arrayness of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    D1,
    D1Array,
    D2,
    D2Array,
    D3,
}

impl ImageType {
    /// Number of filtered coordinate axes.
    #[inline]
    #[must_use]
    pub const fn axes(self) -> usize {
        match self {
            Self::D1 | Self::D1Array => 1,
            Self::D2 | Self::D2Array => 2,
            Self::D3 => 3,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_array(self) -> bool {
        matches!(self, Self::D1Array | Self::D2Array)
    }

    /// Whether texels of `format` can be fetched from this image type.
    #[inline]
    #[must_use]
    pub const fn supports(self, format: Format) -> bool {
        !format.is_compressed() || matches!(self, Self::D2 | Self::D2Array)
    }
}

/// Creation parameters of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDesc {
    pub image_type: ImageType,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub levels: u32,
    pub layers: u32,
}

impl ImageDesc {
    #[must_use]
    pub fn d1(format: Format, width: u32) -> Self {
        Self {
            image_type: ImageType::D1,
            format,
            width,
            height: 1,
            depth: 1,
            levels: 1,
            layers: 1,
        }
    }

    #[must_use]
    pub fn d2(format: Format, width: u32, height: u32) -> Self {
        Self {
            image_type: ImageType::D2,
            height,
            ..Self::d1(format, width)
        }
    }

    #[must_use]
    pub fn d3(format: Format, width: u32, height: u32, depth: u32) -> Self {
        Self {
            image_type: ImageType::D3,
            height,
            depth,
            ..Self::d1(format, width)
        }
    }

    /// Turns a 1D or 2D description into its array variant.
    #[must_use]
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.image_type = match self.image_type {
            ImageType::D1 | ImageType::D1Array => ImageType::D1Array,
            ImageType::D2 | ImageType::D2Array => ImageType::D2Array,
            ImageType::D3 => ImageType::D3,
        };
        self.layers = layers;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    /// Full mip chain length for the largest dimension.
    #[must_use]
    pub fn max_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        u32::BITS - largest.leading_zeros()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(RasterError::InvalidImage(format!("{msg}: {self:?}")));
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return invalid("zero extent");
        }
        if self.levels == 0 || self.levels > self.max_levels() {
            return invalid("level count out of range");
        }
        if self.layers == 0 || (!self.image_type.is_array() && self.layers != 1) {
            return invalid("layer count does not match image type");
        }
        match self.image_type {
            ImageType::D1 | ImageType::D1Array if self.height != 1 || self.depth != 1 => {
                return invalid("1D images have unit height and depth");
            }
            ImageType::D2 | ImageType::D2Array if self.depth != 1 => {
                return invalid("2D images have unit depth");
            }
            _ => {}
        }
        if !self.image_type.supports(self.format) {
            return Err(RasterError::UnsupportedFetch {
                format: self.format,
                image_type: self.image_type,
            });
        }
        Ok(())
    }
}

/// Texel storage for all levels and layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    desc: ImageDesc,
    data: Vec<u8>,
    level_offsets: SmallVec<[usize; 16]>,
    layer_sizes: SmallVec<[usize; 16]>,
}

impl Image {
    /// Allocates zero-initialized storage for `desc`.
    pub fn new(desc: ImageDesc) -> Result<Self> {
        desc.validate()?;

        let mut level_offsets = SmallVec::new();
        let mut layer_sizes = SmallVec::new();
        let mut total = 0usize;
        for level in 0..desc.levels {
            let e = level_extent(&desc, level);
            let layer_size = desc.format.region_size(e.x, e.y, e.z);
            level_offsets.push(total);
            layer_sizes.push(layer_size);
            total = layer_size
                .checked_mul(desc.layers as usize)
                .and_then(|size| total.checked_add(size))
                .ok_or_else(|| RasterError::InvalidImage(format!("image too large: {desc:?}")))?;
        }

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| RasterError::OutOfMemory {
                what: "image storage",
                bytes: total,
            })?;
        data.resize(total, 0);

        Ok(Self {
            desc,
            data,
            level_offsets,
            layer_sizes,
        })
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> Format {
        self.desc.format
    }

    #[inline]
    #[must_use]
    pub fn image_type(&self) -> ImageType {
        self.desc.image_type
    }

    #[inline]
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.desc.levels
    }

    #[inline]
    #[must_use]
    pub fn layers(&self) -> u32 {
        self.desc.layers
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Extent of a mip level, `(1, 1, 1)` past the last level.
    #[must_use]
    pub fn extent(&self, level: u32) -> UVec3 {
        if level < self.desc.levels {
            level_extent(&self.desc, level)
        } else {
            UVec3::ONE
        }
    }

    /// Byte range of one level/layer.
    fn layer_range(&self, level: u32, layer: u32) -> Option<std::ops::Range<usize>> {
        if layer >= self.desc.layers {
            return None;
        }
        let base = *self.level_offsets.get(level as usize)?;
        let size = *self.layer_sizes.get(level as usize)?;
        let start = base + size * layer as usize;
        Some(start..start + size)
    }

    /// Byte offset of the texel (or containing block) at `(x, y, z)`.
    #[must_use]
    pub fn texel_offset(&self, level: u32, layer: u32, x: u32, y: u32, z: u32) -> Option<usize> {
        let range = self.layer_range(level, layer)?;
        let e = self.extent(level);
        if x >= e.x || y >= e.y || z >= e.z {
            return None;
        }
        let format = self.desc.format;
        let b = format.block_extent();
        let (row, rows) = (e.x.div_ceil(b) as usize, e.y.div_ceil(b) as usize);
        let (bx, by) = ((x / b) as usize, (y / b) as usize);
        let index = (z as usize * rows + by) * row + bx;
        Some(range.start + index * format.stride())
    }

    /// Bytes of one texel (or its 4×4 block for compressed formats).
    #[must_use]
    pub fn texel(&self, level: u32, layer: u32, x: u32, y: u32, z: u32) -> Option<&[u8]> {
        let offset = self.texel_offset(level, layer, x, y, z)?;
        self.data.get(offset..offset + self.desc.format.stride())
    }

    #[must_use]
    pub fn texel_mut(&mut self, level: u32, layer: u32, x: u32, y: u32, z: u32) -> Option<&mut [u8]> {
        let offset = self.texel_offset(level, layer, x, y, z)?;
        let stride = self.desc.format.stride();
        self.data.get_mut(offset..offset + stride)
    }

    /// Replaces the contents of one level/layer with raw bytes.
    pub fn upload(&mut self, level: u32, layer: u32, bytes: &[u8]) -> Result<()> {
        let range = self.layer_range(level, layer).ok_or_else(|| {
            RasterError::InvalidImage(format!("level {level} layer {layer} does not exist"))
        })?;
        if bytes.len() != range.len() {
            return Err(RasterError::InvalidImage(format!(
                "upload of {} bytes into a {}-byte level",
                bytes.len(),
                range.len()
            )));
        }
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Typed variant of [`upload`](Self::upload), e.g. `&[[u8; 4]]` or `&[f32]`.
    pub fn upload_pixels<T: Pod>(&mut self, level: u32, layer: u32, pixels: &[T]) -> Result<()> {
        self.upload(level, layer, bytemuck::cast_slice(pixels))
    }

    /// Fills every texel of one level/layer with the same bytes.
    pub(crate) fn fill(&mut self, level: u32, layer: u32, texel: &[u8]) {
        if let Some(range) = self.layer_range(level, layer)
            && !texel.is_empty()
        {
            for chunk in self.data[range].chunks_exact_mut(texel.len()) {
                chunk.copy_from_slice(texel);
            }
        }
    }
}

fn level_extent(desc: &ImageDesc, level: u32) -> UVec3 {
    let shrink = |v: u32| (v >> level).max(1);
    UVec3::new(
        shrink(desc.width),
        shrink(desc.height),
        if desc.image_type == ImageType::D3 {
            shrink(desc.depth)
        } else {
            1
        },
    )
}
