//! Fragments and fragment programs.

use glam::Vec4;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::pipeline::Rgba;
use crate::renderer::texture::Textures;

/// A rasterized fragment candidate.
///
/// `(x, y)` are window coordinates with y growing upward; `z` is the
/// window-space depth before depth-range handling.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub front_facing: bool,
    /// Interpolated shader inputs.
    pub varyings: SmallVec<[Vec4; 4]>,
}

impl Fragment {
    /// A front-facing fragment without varyings.
    #[must_use]
    pub fn new(x: i32, y: i32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            front_facing: true,
            varyings: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn back_facing(mut self) -> Self {
        self.front_facing = false;
        self
    }

    #[must_use]
    pub fn with_varying(mut self, value: Vec4) -> Self {
        self.varyings.push(value);
        self
    }

    /// Varying `index`, or zero if absent.
    #[inline]
    #[must_use]
    pub fn varying(&self, index: usize) -> Vec4 {
        self.varyings.get(index).copied().unwrap_or(Vec4::ZERO)
    }
}

/// A fragment program.
///
/// Returns the shaded color, or `None` to discard the fragment.
pub trait FragmentShader {
    fn shade(&mut self, fragment: &Fragment, textures: &Textures<'_>) -> Result<Option<Rgba>>;
}

/// Shader built from a closure, see [`shader_fn`].
pub struct FnShader<F>(F);

/// Wraps a closure as a [`FragmentShader`].
pub fn shader_fn<F>(f: F) -> FnShader<F>
where
    F: FnMut(&Fragment, &Textures<'_>) -> Result<Option<Rgba>>,
{
    FnShader(f)
}

impl<F> FragmentShader for FnShader<F>
where
    F: FnMut(&Fragment, &Textures<'_>) -> Result<Option<Rgba>>,
{
    #[inline]
    fn shade(&mut self, fragment: &Fragment, textures: &Textures<'_>) -> Result<Option<Rgba>> {
        (self.0)(fragment, textures)
    }
}

/// Shades every fragment with one color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidColor(pub Rgba);

impl FragmentShader for SolidColor {
    #[inline]
    fn shade(&mut self, _fragment: &Fragment, _textures: &Textures<'_>) -> Result<Option<Rgba>> {
        Ok(Some(self.0))
    }
}

/// Why a fragment produced no write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    RasterizerDiscard,
    DepthRange,
    Scissor,
    OutOfBounds,
    StencilTest,
    DepthTest,
    Shader,
}

/// Terminal state of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentOutcome {
    Written,
    Discarded(DiscardReason),
}

impl FragmentOutcome {
    #[inline]
    #[must_use]
    pub fn is_written(self) -> bool {
        self == Self::Written
    }
}

/// Fragment counts of one draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub written: u64,
    pub discarded: u64,
}

impl DrawStats {
    pub(crate) fn record(&mut self, outcome: FragmentOutcome) {
        match outcome {
            FragmentOutcome::Written => self.written += 1,
            FragmentOutcome::Discarded(_) => self.discarded += 1,
        }
    }
}
