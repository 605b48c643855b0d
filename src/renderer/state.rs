//! Pipeline State Types
//!
//! Plain `Copy` value types describing the fixed-function state consumed by
//! the fragment pipeline. They are the rasterizer's counterpart to the
//! `wgpu` descriptor structs: every enum has a dense `u32` discriminant and a
//! fallible [`TryFrom<u32>`] conversion for values arriving from an API layer.
//!
//! Only [`PipelineState`] affects generated code; the remaining state is read
//! directly by the fragment pipeline on every fragment.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::RasterError;

/// Declares a `#[repr(u32)]` enum with a checked `TryFrom<u32>`.
macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        $name:ident : $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Every variant, in discriminant order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for $name {
            type Error = RasterError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    _ => Err(RasterError::UnsupportedState { field: $field, value }),
                }
            }
        }
    };
}

// ─── Blending ────────────────────────────────────────────────────────────────

raw_enum! {
    /// Multiplier applied to a source or destination color before combining.
    BlendFactor: "blend factor" {
        Zero = 0,
        One = 1,
        SrcColor = 2,
        OneMinusSrcColor = 3,
        DstColor = 4,
        OneMinusDstColor = 5,
        SrcAlpha = 6,
        OneMinusSrcAlpha = 7,
        DstAlpha = 8,
        OneMinusDstAlpha = 9,
        ConstantColor = 10,
        OneMinusConstantColor = 11,
        ConstantAlpha = 12,
        OneMinusConstantAlpha = 13,
        /// `min(src_alpha, 1 - dst_alpha)`, resolved with an explicit branch.
        SrcAlphaSaturate = 14,
    }
}

raw_enum! {
    /// How the scaled source and destination are combined.
    BlendEquation: "blend equation" {
        Add = 0,
        /// `src - dst`
        Subtract = 1,
        /// `dst - src`
        ReverseSubtract = 2,
        /// Per-channel minimum of the scaled operands.
        Min = 3,
        /// Per-channel maximum of the scaled operands.
        Max = 4,
    }
}

bitflags! {
    /// Color channels that may be written to the destination.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ColorMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const RGB = Self::R.bits() | Self::G.bits() | Self::B.bits();
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::all()
    }
}

impl ColorMask {
    /// Per-channel flags in RGBA order.
    #[inline]
    #[must_use]
    pub fn channels(self) -> [bool; 4] {
        [
            self.contains(Self::R),
            self.contains(Self::G),
            self.contains(Self::B),
            self.contains(Self::A),
        ]
    }
}

/// Blend configuration of the single color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendAttachmentState {
    pub enable: bool,
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub eq_rgb: BlendEquation,
    pub eq_alpha: BlendEquation,
    pub color_mask: ColorMask,
}

impl Default for BlendAttachmentState {
    fn default() -> Self {
        Self::REPLACE
    }
}

impl BlendAttachmentState {
    /// Blending off, all channels writable.
    pub const REPLACE: Self = Self {
        enable: false,
        src_rgb: BlendFactor::One,
        dst_rgb: BlendFactor::Zero,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::Zero,
        eq_rgb: BlendEquation::Add,
        eq_alpha: BlendEquation::Add,
        color_mask: ColorMask::all(),
    };

    /// Classic non-premultiplied "over" compositing.
    pub const ALPHA_BLENDING: Self = Self {
        enable: true,
        src_rgb: BlendFactor::SrcAlpha,
        dst_rgb: BlendFactor::OneMinusSrcAlpha,
        src_alpha: BlendFactor::One,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
        eq_rgb: BlendEquation::Add,
        eq_alpha: BlendEquation::Add,
        color_mask: ColorMask::all(),
    };

    /// Builds an attachment from raw API values, rejecting undefined enums.
    pub fn from_raw(raw: &RawBlendAttachment) -> Result<Self, RasterError> {
        Ok(Self {
            enable: raw.enable,
            src_rgb: BlendFactor::try_from(raw.src_rgb)?,
            dst_rgb: BlendFactor::try_from(raw.dst_rgb)?,
            src_alpha: BlendFactor::try_from(raw.src_alpha)?,
            dst_alpha: BlendFactor::try_from(raw.dst_alpha)?,
            eq_rgb: BlendEquation::try_from(raw.eq_rgb)?,
            eq_alpha: BlendEquation::try_from(raw.eq_alpha)?,
            color_mask: ColorMask::from_bits(raw.color_mask).ok_or(
                RasterError::UnsupportedState {
                    field: "color mask",
                    value: u32::from(raw.color_mask),
                },
            )?,
        })
    }
}

/// Untyped attachment description as handed over by an API front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawBlendAttachment {
    pub enable: bool,
    pub src_rgb: u32,
    pub dst_rgb: u32,
    pub src_alpha: u32,
    pub dst_alpha: u32,
    pub eq_rgb: u32,
    pub eq_alpha: u32,
    pub color_mask: u8,
}

/// The state that selects a specialized blend unit.
///
/// Two states compare equal exactly when they must share a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub attachment: BlendAttachmentState,
    /// Global blending switch; blending happens only when this and
    /// `attachment.enable` are both set.
    pub blend_enabled: bool,
    pub depth_write: bool,
}

impl PipelineState {
    #[inline]
    #[must_use]
    pub const fn blending_active(&self) -> bool {
        self.blend_enabled && self.attachment.enable
    }
}

// ─── Depth / Stencil ─────────────────────────────────────────────────────────

raw_enum! {
    /// Comparison used by the depth and stencil tests.
    CompareOp: "compare op" {
        Never = 0,
        Less = 1,
        LessEqual = 2,
        Equal = 3,
        GreaterEqual = 4,
        Greater = 5,
        NotEqual = 6,
        Always = 7,
    }
}

impl CompareOp {
    /// Evaluates `lhs OP rhs`.
    #[inline]
    #[must_use]
    pub fn test<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => lhs < rhs,
            Self::LessEqual => lhs <= rhs,
            Self::Equal => lhs == rhs,
            Self::GreaterEqual => lhs >= rhs,
            Self::Greater => lhs > rhs,
            Self::NotEqual => lhs != rhs,
            Self::Always => true,
        }
    }
}

raw_enum! {
    /// Update applied to the stored stencil value.
    StencilOp: "stencil op" {
        Keep = 0,
        Zero = 1,
        Replace = 2,
        IncrementClamp = 3,
        IncrementWrap = 4,
        DecrementClamp = 5,
        DecrementWrap = 6,
        Invert = 7,
    }
}

impl StencilOp {
    /// Applies the op to `value`, touching only the bits set in `write_mask`.
    #[inline]
    #[must_use]
    pub fn apply(self, value: u8, reference: u8, write_mask: u8) -> u8 {
        let updated = match self {
            Self::Keep => return value,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::IncrementClamp => value.saturating_add(1),
            Self::IncrementWrap => value.wrapping_add(1),
            Self::DecrementClamp => value.saturating_sub(1),
            Self::DecrementWrap => value.wrapping_sub(1),
            Self::Invert => !value,
        };
        (value & !write_mask) | (updated & write_mask)
    }
}

/// Stencil configuration of one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StencilFaceState {
    pub compare: CompareOp,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub compare_mask: u8,
    pub write_mask: u8,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        Self {
            compare: CompareOp::Always,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            compare_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

/// Depth and stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub stencil_test: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: true,
            depth_compare: CompareOp::Less,
            stencil_test: false,
            front: StencilFaceState::default(),
            back: StencilFaceState::default(),
        }
    }
}

impl DepthStencilState {
    #[inline]
    #[must_use]
    pub fn face(&self, front_facing: bool) -> &StencilFaceState {
        if front_facing { &self.front } else { &self.back }
    }
}

// ─── Rasterizer ──────────────────────────────────────────────────────────────

/// Per-draw rasterizer switches that gate fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RasterizerState {
    pub rasterizer_discard: bool,
    pub depth_clamp: bool,
    pub scissor_test: bool,
}

/// Viewport depth range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self {
            near: 0.0,
            far: 1.0,
        }
    }
}

impl DepthRange {
    #[inline]
    #[must_use]
    pub fn contains(&self, z: f32) -> bool {
        z >= self.near && z <= self.far
    }

    #[inline]
    #[must_use]
    pub fn clamp(&self, z: f32) -> f32 {
        z.max(self.near).min(self.far)
    }
}

/// Window-space rectangle, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    #[inline]
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (x0, y0) = (i64::from(self.x), i64::from(self.y));
        x >= x0 && y >= y0 && x < x0 + i64::from(self.width) && y < y0 + i64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_enum_round_trip_and_rejects_unknown() {
        for &f in BlendFactor::ALL {
            assert_eq!(BlendFactor::try_from(f.raw()), Ok(f));
        }
        assert_eq!(
            BlendEquation::try_from(5),
            Err(RasterError::UnsupportedState {
                field: "blend equation",
                value: 5
            })
        );
    }

    #[test]
    fn test_stencil_ops_respect_write_mask() {
        assert_eq!(StencilOp::IncrementClamp.apply(255, 0, 0xff), 255);
        assert_eq!(StencilOp::DecrementClamp.apply(0, 0, 0xff), 0);
        assert_eq!(StencilOp::IncrementWrap.apply(255, 0, 0xff), 0);
        assert_eq!(StencilOp::DecrementWrap.apply(0, 0, 0xff), 255);
        assert_eq!(StencilOp::Invert.apply(0b1010_1010, 0, 0x0f), 0b1010_0101);
        assert_eq!(StencilOp::Replace.apply(0xf0, 0x0f, 0x3c), 0xcc);
        assert_eq!(StencilOp::Keep.apply(7, 1, 0xff), 7);
    }

    #[test]
    fn test_bad_color_mask_bits_rejected() {
        let raw = RawBlendAttachment {
            src_rgb: 1,
            color_mask: 0x10,
            ..Default::default()
        };
        assert!(BlendAttachmentState::from_raw(&raw).is_err());
    }
}
