//! Render Context
//!
//! [`RenderContext`] holds all mutable per-context state: resources, bound
//! render targets, texture units, fixed-function state and the
//! specialization cache. Every operation takes the context explicitly.
//!
//! # Fragment Pipeline
//!
//! ```text
//! rasterizer discard ─▶ depth range (clamp | discard) ─▶ scissor / bounds
//!   ─▶ stencil test ──fail──▶ fail_op, discard
//!   ─▶ depth test ────fail──▶ depth_fail_op (stencil on), discard
//!   ─▶ fragment program ──None──▶ discard
//!   ─▶ clamp [0,1] ─▶ blend unit (blend + mask merge + depth)
//!   ─▶ pass_op (stencil on) ─▶ depth store (depth write on)
//! ```
//!
//! The blend unit for the current [`PipelineState`] is resolved before the
//! first test runs, so a compile failure rejects the fragment (or the whole
//! draw) without touching any target.

use std::sync::Arc;

use glam::{Vec3, Vec4};
use smallvec::SmallVec;

use crate::errors::{RasterError, Result};
use crate::renderer::fragment::{
    DiscardReason, DrawStats, Fragment, FragmentOutcome, FragmentShader,
};
use crate::renderer::pipeline::{CompiledUnit, Rgba, SpecializationCache, UnitHandle};
use crate::renderer::resource_manager::ResourceManager;
use crate::renderer::state::{
    BlendAttachmentState, ColorMask, DepthRange, DepthStencilState, PipelineState,
    RasterizerState, ScissorRect, StencilOp,
};
use crate::renderer::texture::{TextureBinding, TextureUnits, Textures};
use crate::resources::{ImageViewId, SamplerId, Surface, SurfaceId};
use crate::settings::RasterSettings;

/// Per-face stencil reference values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StencilReference {
    pub front: u8,
    pub back: u8,
}

impl StencilReference {
    #[inline]
    #[must_use]
    pub fn get(&self, front_facing: bool) -> u8 {
        if front_facing { self.front } else { self.back }
    }
}

/// Stencil value read before the tests, updated by the stencil ops.
#[derive(Debug, Clone, Copy)]
struct StencilTexel {
    target: SurfaceId,
    x: u32,
    y: u32,
    stored: u8,
}

/// Surfaces written by fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RenderTargets {
    color: Option<SurfaceId>,
    depth: Option<SurfaceId>,
    stencil: Option<SurfaceId>,
}

impl RenderTargets {
    fn iter(&self) -> impl Iterator<Item = SurfaceId> {
        [self.color, self.depth, self.stencil].into_iter().flatten()
    }
}

pub struct RenderContext {
    settings: RasterSettings,
    resources: ResourceManager,
    texture_units: TextureUnits,
    cache: SpecializationCache,
    targets: RenderTargets,
    /// Last resolved unit; reused while the pipeline state is unchanged.
    current: Option<(PipelineState, UnitHandle)>,

    pub blend: BlendAttachmentState,
    /// Global blending switch, combined with `blend.enable`.
    pub blend_enabled: bool,
    pub blend_constant: Rgba,
    pub depth_stencil: DepthStencilState,
    pub rasterizer: RasterizerState,
    pub depth_range: DepthRange,
    pub scissor: ScissorRect,
    pub stencil_reference: StencilReference,
}

impl RenderContext {
    pub fn new(settings: RasterSettings) -> Result<Self> {
        let cache = SpecializationCache::from_settings(&settings)?;
        Ok(Self {
            texture_units: TextureUnits::new(settings.texture_units),
            settings,
            resources: ResourceManager::new(),
            cache,
            targets: RenderTargets::default(),
            current: None,
            blend: BlendAttachmentState::REPLACE,
            blend_enabled: false,
            blend_constant: [0.0; 4],
            depth_stencil: DepthStencilState::default(),
            rasterizer: RasterizerState::default(),
            depth_range: DepthRange::default(),
            scissor: ScissorRect::default(),
            stencil_reference: StencilReference::default(),
        })
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RasterSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &SpecializationCache {
        &self.cache
    }

    #[inline]
    pub fn cache_mut(&mut self) -> &mut SpecializationCache {
        &mut self.cache
    }

    // ========================================================================
    // Render Targets
    // ========================================================================

    pub fn set_color_target(&mut self, target: Option<SurfaceId>) -> Result<()> {
        self.check_target(target, "color", |s| s.format.is_color_renderable())?;
        self.targets.color = target;
        Ok(())
    }

    pub fn set_depth_target(&mut self, target: Option<SurfaceId>) -> Result<()> {
        self.check_target(target, "depth", |s| s.format.has_depth())?;
        self.targets.depth = target;
        Ok(())
    }

    pub fn set_stencil_target(&mut self, target: Option<SurfaceId>) -> Result<()> {
        self.check_target(target, "stencil", |s| s.format.has_stencil())?;
        self.targets.stencil = target;
        Ok(())
    }

    fn check_target(
        &self,
        target: Option<SurfaceId>,
        aspect: &'static str,
        supported: impl Fn(&Surface) -> bool,
    ) -> Result<()> {
        let Some(id) = target else {
            return Ok(());
        };
        let surface = self.resources.surface(id)?;
        if supported(surface) {
            Ok(())
        } else {
            Err(RasterError::UnsupportedRenderTarget {
                format: surface.format,
                aspect,
            })
        }
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn bind_texture(&mut self, unit: usize, view: ImageViewId, sampler: SamplerId) -> Result<()> {
        self.resources.view(view)?;
        self.resources.sampler(sampler)?;
        self.texture_units.bind(unit, TextureBinding { view, sampler })
    }

    pub fn unbind_texture(&mut self, unit: usize) -> Result<()> {
        self.texture_units.unbind(unit)
    }

    /// Sampling access to the bound texture units.
    #[must_use]
    pub fn textures(&self) -> Textures<'_> {
        Textures::new(&self.resources, &self.texture_units)
    }

    pub fn sample(&self, unit: usize, coord: Vec3) -> Result<Vec4> {
        self.textures().sample(unit, coord)
    }

    pub fn sample_lod(&self, unit: usize, coord: Vec3, lod: f32) -> Result<Vec4> {
        self.textures().sample_lod(unit, coord, lod)
    }

    // ========================================================================
    // Specialization
    // ========================================================================

    /// The code-affecting subset of the current state.
    #[must_use]
    pub fn pipeline_state(&self) -> PipelineState {
        PipelineState {
            attachment: self.blend,
            blend_enabled: self.blend_enabled,
            depth_write: self.depth_stencil.depth_write,
        }
    }

    /// Compiles (or finds) the unit for the current state.
    pub fn ensure_compiled(&mut self) -> Result<UnitHandle> {
        self.current_unit().map(|(handle, _)| handle)
    }

    fn current_unit(&mut self) -> Result<(UnitHandle, Arc<CompiledUnit>)> {
        let state = self.pipeline_state();
        if let Some((cached, handle)) = self.current
            && cached == state
            && let Some(unit) = self.cache.unit(handle)
        {
            return Ok((handle, Arc::clone(unit)));
        }
        let handle = self.cache.ensure_compiled(&state)?;
        let unit = self
            .cache
            .unit(handle)
            .cloned()
            .ok_or(RasterError::InvalidHandle("blend unit"))?;
        self.current = Some((state, handle));
        Ok((handle, unit))
    }

    // ========================================================================
    // Fragments
    // ========================================================================

    /// Runs one fragment through the pipeline.
    pub fn process_fragment<S>(&mut self, fragment: &Fragment, shader: &mut S) -> Result<FragmentOutcome>
    where
        S: FragmentShader + ?Sized,
    {
        let (_, unit) = self.current_unit()?;
        self.run_fragment(&unit, fragment, shader)
    }

    /// Runs a batch of fragments with one shader.
    ///
    /// The blend unit is resolved once up front; if that fails no fragment
    /// is processed.
    pub fn draw<S>(&mut self, fragments: &[Fragment], shader: &mut S) -> Result<DrawStats>
    where
        S: FragmentShader + ?Sized,
    {
        let (handle, unit) = match self.current_unit() {
            Ok(resolved) => resolved,
            Err(e) => {
                log::warn!("draw of {} fragments rejected: {e}", fragments.len());
                return Err(e);
            }
        };
        let mut stats = DrawStats::default();
        for fragment in fragments {
            stats.record(self.run_fragment(&unit, fragment, shader)?);
        }
        log::trace!(
            "draw with unit {handle:?}: {} written, {} discarded",
            stats.written,
            stats.discarded
        );
        Ok(stats)
    }

    fn run_fragment<S>(
        &mut self,
        unit: &CompiledUnit,
        fragment: &Fragment,
        shader: &mut S,
    ) -> Result<FragmentOutcome>
    where
        S: FragmentShader + ?Sized,
    {
        use DiscardReason as Why;
        let discard = |why| Ok(FragmentOutcome::Discarded(why));

        if self.rasterizer.rasterizer_discard {
            return discard(Why::RasterizerDiscard);
        }

        let mut z = fragment.z;
        if !self.depth_range.contains(z) {
            if !self.rasterizer.depth_clamp {
                return discard(Why::DepthRange);
            }
            z = self.depth_range.clamp(z);
        }

        if self.rasterizer.scissor_test && !self.scissor.contains(fragment.x, fragment.y) {
            return discard(Why::Scissor);
        }
        let (Ok(x), Ok(y)) = (u32::try_from(fragment.x), u32::try_from(fragment.y)) else {
            return discard(Why::OutOfBounds);
        };
        for target in self.targets.iter() {
            if self.resources.surface(target)?.texel_coord(x, y).is_none() {
                return discard(Why::OutOfBounds);
            }
        }

        // ── Stencil / Depth ──
        let ds = self.depth_stencil;
        let face = *ds.face(fragment.front_facing);
        let reference = self.stencil_reference.get(fragment.front_facing);
        let stencil = match self.targets.stencil {
            Some(target) if ds.stencil_test => Some(StencilTexel {
                target,
                x,
                y,
                stored: self.stencil_at(target, x, y)?,
            }),
            _ => None,
        };

        if let Some(texel) = stencil
            && !face
                .compare
                .test(reference & face.compare_mask, texel.stored & face.compare_mask)
        {
            self.update_stencil(stencil, face.fail_op, reference, face.write_mask)?;
            return discard(Why::StencilTest);
        }

        if ds.depth_test
            && let Some(target) = self.targets.depth
            && !ds.depth_compare.test(z, self.depth_at(target, x, y)?)
        {
            self.update_stencil(stencil, face.depth_fail_op, reference, face.write_mask)?;
            return discard(Why::DepthTest);
        }

        // ── Shading ──
        let textures = Textures::new(&self.resources, &self.texture_units);
        let Some(shaded) = shader.shade(fragment, &textures)? else {
            return discard(Why::Shader);
        };
        let shaded = shaded.map(|c| c.clamp(0.0, 1.0));

        // ── Blend / Write ──
        let mut depth = z;
        match self.targets.color {
            Some(target) => {
                let format = self.resources.surface(target)?.format;
                let bytes = self
                    .resources
                    .surface_texel_mut(target, x, y)?
                    .ok_or_else(|| missing_texel("color", x, y))?;
                let mut color = format
                    .decode(bytes)
                    .ok_or_else(|| missing_texel("color", x, y))?
                    .to_array();
                unit.invoke(&mut color, &mut depth, &shaded, z, &self.blend_constant);
                format.encode(
                    Vec4::from_array(color),
                    unit.state().attachment.color_mask,
                    bytes,
                )?;
            }
            None => {
                let mut discarded = [0.0; 4];
                unit.invoke(&mut discarded, &mut depth, &shaded, z, &self.blend_constant);
            }
        }

        self.update_stencil(stencil, face.pass_op, reference, face.write_mask)?;
        if unit.state().depth_write
            && let Some(target) = self.targets.depth
        {
            self.write_depth_at(target, x, y, depth)?;
        }
        Ok(FragmentOutcome::Written)
    }

    fn stencil_at(&self, target: SurfaceId, x: u32, y: u32) -> Result<u8> {
        let format = self.resources.surface(target)?.format;
        self.resources
            .surface_texel(target, x, y)?
            .and_then(|bytes| format.read_stencil(bytes))
            .ok_or_else(|| missing_texel("stencil", x, y))
    }

    /// Applies `op` to a tested stencil texel; `None` when stencil is off.
    fn update_stencil(
        &mut self,
        texel: Option<StencilTexel>,
        op: StencilOp,
        reference: u8,
        write_mask: u8,
    ) -> Result<()> {
        let Some(StencilTexel { target, x, y, stored }) = texel else {
            return Ok(());
        };
        let value = op.apply(stored, reference, write_mask);
        if value == stored {
            return Ok(());
        }
        let format = self.resources.surface(target)?.format;
        let bytes = self
            .resources
            .surface_texel_mut(target, x, y)?
            .ok_or_else(|| missing_texel("stencil", x, y))?;
        format.write_stencil(value, bytes)
    }

    fn depth_at(&self, target: SurfaceId, x: u32, y: u32) -> Result<f32> {
        let format = self.resources.surface(target)?.format;
        self.resources
            .surface_texel(target, x, y)?
            .and_then(|bytes| format.read_depth(bytes))
            .ok_or_else(|| missing_texel("depth", x, y))
    }

    fn write_depth_at(&mut self, target: SurfaceId, x: u32, y: u32, depth: f32) -> Result<()> {
        let format = self.resources.surface(target)?.format;
        let bytes = self
            .resources
            .surface_texel_mut(target, x, y)?
            .ok_or_else(|| missing_texel("depth", x, y))?;
        format.write_depth(depth, bytes)
    }

    // ========================================================================
    // Clears
    // ========================================================================

    /// Clears the color target, honoring the color mask and the scissor.
    pub fn clear_color(&mut self, color: Rgba) -> Result<()> {
        let Some(target) = self.targets.color else {
            return Ok(());
        };
        let mask = self.blend.color_mask;
        let surface = *self.resources.surface(target)?;
        let value = Vec4::from_array(color);

        if mask == ColorMask::all() && !self.rasterizer.scissor_test {
            let mut texel: SmallVec<[u8; 16]> = SmallVec::from_elem(0, surface.format.stride());
            surface.format.encode(value, mask, &mut texel)?;
            self.resources
                .image_mut(surface.image)?
                .fill(surface.level, surface.layer, &texel);
            return Ok(());
        }
        self.clear_with(target, |bytes| surface.format.encode(value, mask, bytes))
    }

    /// Clears the depth target, honoring the scissor.
    pub fn clear_depth(&mut self, depth: f32) -> Result<()> {
        let Some(target) = self.targets.depth else {
            return Ok(());
        };
        let format = self.resources.surface(target)?.format;
        self.clear_with(target, |bytes| format.write_depth(depth, bytes))
    }

    /// Clears the stencil target, honoring the front write mask and the
    /// scissor.
    pub fn clear_stencil(&mut self, value: u8) -> Result<()> {
        let Some(target) = self.targets.stencil else {
            return Ok(());
        };
        let format = self.resources.surface(target)?.format;
        let write_mask = self.depth_stencil.front.write_mask;
        self.clear_with(target, |bytes| {
            let old = format.read_stencil(bytes).unwrap_or(0);
            format.write_stencil((old & !write_mask) | (value & write_mask), bytes)
        })
    }

    fn clear_with(&mut self, target: SurfaceId, mut write: impl FnMut(&mut [u8]) -> Result<()>) -> Result<()> {
        let surface = *self.resources.surface(target)?;
        let scissor = self.rasterizer.scissor_test.then_some(self.scissor);
        let image = self.resources.image_mut(surface.image)?;
        for y in 0..surface.height {
            for x in 0..surface.width {
                if let Some(rect) = scissor
                    && !rect.contains(x as i32, y as i32)
                {
                    continue;
                }
                let Some((tx, ty)) = surface.texel_coord(x, y) else {
                    continue;
                };
                if let Some(bytes) = image.texel_mut(surface.level, surface.layer, tx, ty, 0) {
                    write(bytes)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Readback
    // ========================================================================

    /// Color at window position `(x, y)`; `None` without a color target or
    /// outside it.
    pub fn read_color(&self, x: u32, y: u32) -> Result<Option<Vec4>> {
        let Some(target) = self.targets.color else {
            return Ok(None);
        };
        let format = self.resources.surface(target)?.format;
        Ok(self
            .resources
            .surface_texel(target, x, y)?
            .and_then(|bytes| format.decode(bytes)))
    }

    pub fn read_depth(&self, x: u32, y: u32) -> Result<Option<f32>> {
        match self.targets.depth {
            Some(target) => self.depth_at(target, x, y).map(Some).or_else(|e| match e {
                RasterError::InvalidImage(_) => Ok(None),
                e => Err(e),
            }),
            None => Ok(None),
        }
    }

    pub fn read_stencil(&self, x: u32, y: u32) -> Result<Option<u8>> {
        match self.targets.stencil {
            Some(target) => self.stencil_at(target, x, y).map(Some).or_else(|e| match e {
                RasterError::InvalidImage(_) => Ok(None),
                e => Err(e),
            }),
            None => Ok(None),
        }
    }
}

fn missing_texel(aspect: &str, x: u32, y: u32) -> RasterError {
    RasterError::InvalidImage(format!("no {aspect} texel at ({x}, {y})"))
}
