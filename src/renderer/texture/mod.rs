//! Texture Sampling
//!
//! Maps a normalized coordinate on a bound texture unit to an RGBA color:
//!
//! ```text
//! unit ─▶ (view, sampler) ─▶ level/layer select ─▶ per-axis split + wrap
//!      ─▶ filter (X ▸ Y ▸ Z) ─▶ fetch/decode ─▶ swizzle + clamp
//! ```
//!
//! An unbound unit short-circuits to opaque black.

pub mod filter;
pub mod wrap;

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use self::filter::{AxisCoord, Cubic, Linear, Nearest, filter};
use crate::errors::{RasterError, Result};
use crate::renderer::resource_manager::ResourceManager;
use crate::resources::bc::{BlockTexels, decode_block};
use crate::resources::{
    FilterMode, Format, Image, ImageType, ImageView, ImageViewId, Layout, MipmapFilterMode,
    SamplerId, Swizzle, TextureSampler,
};

/// Color returned by a unit with nothing bound.
pub const UNBOUND_COLOR: Vec4 = Vec4::W;

/// View and sampler bound to one texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub view: ImageViewId,
    pub sampler: SamplerId,
}

/// Fixed-size table of texture units.
#[derive(Debug, Clone)]
pub struct TextureUnits {
    slots: Box<[Option<TextureBinding>]>,
}

impl TextureUnits {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, unit: usize) -> Result<&mut Option<TextureBinding>> {
        let max = self.slots.len();
        self.slots
            .get_mut(unit)
            .ok_or(RasterError::TextureUnitOutOfRange { unit, max })
    }

    pub fn bind(&mut self, unit: usize, binding: TextureBinding) -> Result<()> {
        *self.slot_mut(unit)? = Some(binding);
        Ok(())
    }

    pub fn unbind(&mut self, unit: usize) -> Result<()> {
        *self.slot_mut(unit)? = None;
        Ok(())
    }

    pub fn binding(&self, unit: usize) -> Result<Option<TextureBinding>> {
        let max = self.slots.len();
        self.slots
            .get(unit)
            .copied()
            .ok_or(RasterError::TextureUnitOutOfRange { unit, max })
    }
}

/// Read-only sampling access handed to fragment shaders.
#[derive(Clone, Copy)]
pub struct Textures<'a> {
    resources: &'a ResourceManager,
    units: &'a TextureUnits,
}

impl<'a> Textures<'a> {
    #[must_use]
    pub fn new(resources: &'a ResourceManager, units: &'a TextureUnits) -> Self {
        Self { resources, units }
    }

    /// Samples `unit` at `coord` from the view's base level with the
    /// magnification filter.
    pub fn sample(&self, unit: usize, coord: Vec3) -> Result<Vec4> {
        let Some((image, view, sampler)) = self.resolve(unit)? else {
            return Ok(UNBOUND_COLOR);
        };
        let texel = sample_level(image, view, sampler, coord, view.min_level, sampler.mag_filter)?;
        Ok(swizzle(view.swizzle, texel))
    }

    /// Samples `unit` at an explicit level of detail.
    ///
    /// The biased, clamped LOD picks the filter (minification above zero)
    /// and the mip level; `MipmapFilterMode::Linear` blends the two nearest
    /// levels.
    pub fn sample_lod(&self, unit: usize, coord: Vec3, lod: f32) -> Result<Vec4> {
        let Some((image, view, sampler)) = self.resolve(unit)? else {
            return Ok(UNBOUND_COLOR);
        };
        let lod = (lod + sampler.lod_bias)
            .max(sampler.lod_min_clamp)
            .min(sampler.lod_max_clamp);
        let filter_mode = sampler.filter_for_lod(lod);
        let last = (view.num_levels - 1) as f32;
        let level = |l: f32| view.min_level + l.clamp(0.0, last) as u32;

        let texel = match sampler.mipmap_filter {
            MipmapFilterMode::Nearest => {
                sample_level(image, view, sampler, coord, level(lod.round()), filter_mode)?
            }
            MipmapFilterMode::Linear => {
                let base = lod.max(0.0).floor();
                let a = sample_level(image, view, sampler, coord, level(base), filter_mode)?;
                let b = sample_level(image, view, sampler, coord, level(base + 1.0), filter_mode)?;
                a + (b - a) * (lod.max(0.0) - base)
            }
        };
        Ok(swizzle(view.swizzle, texel))
    }

    fn resolve(&self, unit: usize) -> Result<Option<(&'a Image, &'a ImageView, &'a TextureSampler)>> {
        let Some(binding) = self.units.binding(unit)? else {
            return Ok(None);
        };
        let view = self.resources.view(binding.view)?;
        let image = self.resources.image(view.image)?;
        let sampler = self.resources.sampler(binding.sampler)?;
        Ok(Some((image, view, sampler)))
    }
}

#[inline]
fn swizzle(swizzle: [Swizzle; 4], texel: Vec4) -> Vec4 {
    let texel = texel.to_array();
    Vec4::from_array(swizzle.map(|s| s.select(texel)))
}

/// Filters one mip level of `view`, before swizzling.
fn sample_level(
    image: &Image,
    view: &ImageView,
    sampler: &TextureSampler,
    coord: Vec3,
    level: u32,
    filter_mode: FilterMode,
) -> Result<Vec4> {
    let extent = image.extent(level).to_array();
    let modes = sampler.address_modes();
    let coords = coord.to_array();

    let layer_coord = match image.image_type() {
        ImageType::D1Array => Some(coord.y),
        ImageType::D2Array => Some(coord.z),
        ImageType::D1 | ImageType::D2 | ImageType::D3 => None,
    };
    let last_layer = (view.num_layers - 1) as f32;
    let layer = view.min_layer
        + layer_coord.map_or(0, |c| c.round().clamp(0.0, last_layer) as u32);

    let axes: SmallVec<[AxisCoord; 3]> = (0..image.image_type().axes())
        .map(|a| AxisCoord::new(coords[a], extent[a], modes[a]))
        .collect();

    let mut fetcher = TexelFetch {
        image,
        format: view.format,
        level,
        layer,
        block: None,
    };
    let mut fetch = |texel: [i32; 3]| fetcher.fetch(texel);
    let border = Vec4::from_array(sampler.border_color);
    match filter_mode {
        FilterMode::Nearest => filter::<Nearest, _>(&axes, 0, [0; 3], border, &mut fetch),
        FilterMode::Linear => filter::<Linear, _>(&axes, 0, [0; 3], border, &mut fetch),
        FilterMode::Cubic => filter::<Cubic, _>(&axes, 0, [0; 3], border, &mut fetch),
    }
}

/// Per-call fetch state: the addressed level/layer and the last decoded
/// compressed block.
struct TexelFetch<'a> {
    image: &'a Image,
    format: Format,
    level: u32,
    layer: u32,
    block: Option<(usize, BlockTexels)>,
}

impl TexelFetch<'_> {
    fn fetch(&mut self, texel: [i32; 3]) -> Result<Vec4> {
        let [x, y, z] = texel.map(|v| v.max(0) as u32);
        let out_of_range = || {
            RasterError::InvalidImage(format!(
                "texel ({x}, {y}, {z}) outside level {} layer {}",
                self.level, self.layer
            ))
        };
        let offset = self
            .image
            .texel_offset(self.level, self.layer, x, y, z)
            .ok_or_else(out_of_range)?;
        let bytes = self
            .image
            .data()
            .get(offset..offset + self.format.stride())
            .ok_or_else(out_of_range)?;

        match self.format.layout() {
            Layout::Block(kind) => {
                let index = (x % 4 + 4 * (y % 4)) as usize;
                if let Some((cached, texels)) = &self.block
                    && *cached == offset
                {
                    return Ok(texels[index]);
                }
                let texels = decode_block(kind, bytes).ok_or_else(out_of_range)?;
                self.block = Some((offset, texels));
                Ok(texels[index])
            }
            _ => self.format.decode(bytes).ok_or_else(out_of_range),
        }
    }
}
