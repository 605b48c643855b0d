//! Separable texel filtering.
//!
//! One generic recursive function filters any number of axes with any
//! kernel: axis `n` takes the kernel's taps along `n`, each tap recursing
//! into axis `n + 1`, and the innermost level fetches a texel. The kernel
//! then folds the taps with that axis' fractional weight.
//!
//! ```text
//! filter(X) ─┬─ tap x0 ─ filter(Y) ─┬─ tap y0 ─ fetch(x0, y0)
//!            │                      └─ tap y1 ─ fetch(x0, y1)
//!            └─ tap x1 ─ filter(Y) ─┬─ …
//! ```

use glam::Vec4;

use super::wrap::wrap;
use crate::errors::Result;
use crate::resources::AddressMode;

/// Per-axis coordinate split: `v * size - 0.5 = block + frac`.
///
/// `block` saturates for huge or infinite coordinates; `frac` is zero when
/// `v` is not finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCoord {
    pub block: i64,
    pub frac: f32,
    pub size: i32,
    pub mode: AddressMode,
}

impl AxisCoord {
    #[must_use]
    pub fn new(coord: f32, size: u32, mode: AddressMode) -> Self {
        let v = coord * size as f32 - 0.5;
        let floor = v.floor();
        Self {
            block: floor as i64,
            frac: if v.is_finite() { v - floor } else { 0.0 },
            size: size as i32,
            mode,
        }
    }
}

/// A 1D filter kernel.
pub trait Kernel {
    /// Number of taps, at most 4.
    const TAPS: usize;
    /// Offset of the first tap relative to the block coordinate.
    const FIRST: i64;

    fn combine(taps: &[Vec4; 4], frac: f32) -> Vec4;
}

pub struct Nearest;
pub struct Linear;
pub struct Cubic;

impl Kernel for Nearest {
    const TAPS: usize = 1;
    const FIRST: i64 = 0;

    #[inline]
    fn combine(taps: &[Vec4; 4], _frac: f32) -> Vec4 {
        taps[0]
    }
}

impl Kernel for Linear {
    const TAPS: usize = 2;
    const FIRST: i64 = 0;

    #[inline]
    fn combine(taps: &[Vec4; 4], frac: f32) -> Vec4 {
        taps[0] + (taps[1] - taps[0]) * frac
    }
}

impl Kernel for Cubic {
    const TAPS: usize = 4;
    const FIRST: i64 = -1;

    /// Cubic Hermite through taps 1 and 2, tangents from neighbor differences.
    #[inline]
    fn combine(taps: &[Vec4; 4], frac: f32) -> Vec4 {
        let (p0, p1) = (taps[1], taps[2]);
        let (m0, m1) = (taps[1] - taps[0], taps[3] - taps[2]);
        let f3 = p0 * 2.0 + m0 - p1 * 2.0 + m1;
        let f2 = p0 * -3.0 - m0 * 2.0 + p1 * 3.0 - m1 + f3 * frac;
        let f1 = m0 + f2 * frac;
        p0 + f1 * frac
    }
}

/// Filters `axes.len()` axes starting at `axis`.
///
/// `texel` accumulates the wrapped coordinates of the current tap path;
/// `fetch` reads the texel at a fully resolved coordinate. A tap that wraps
/// to the border yields `border` without fetching.
pub fn filter<K: Kernel, F>(
    axes: &[AxisCoord],
    axis: usize,
    texel: [i32; 3],
    border: Vec4,
    fetch: &mut F,
) -> Result<Vec4>
where
    F: FnMut([i32; 3]) -> Result<Vec4>,
{
    let Some(coord) = axes.get(axis) else {
        return fetch(texel);
    };

    let mut taps = [Vec4::ZERO; 4];
    for (i, tap) in taps.iter_mut().take(K::TAPS).enumerate() {
        let v = coord.block.saturating_add(K::FIRST + i as i64);
        *tap = match wrap(coord.mode, coord.size, v) {
            Some(w) => {
                let mut next = texel;
                next[axis] = w;
                filter::<K, F>(axes, axis + 1, next, border, fetch)?
            }
            None => border,
        };
    }
    Ok(K::combine(&taps, coord.frac))
}
