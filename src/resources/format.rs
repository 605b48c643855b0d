//! Texel Formats
//!
//! Every [`Format`] maps to a [`Layout`] that drives decoding, encoding and
//! size computations. Formats fall into four families:
//!
//! | Family        | Examples                          | Texel unit      |
//! |---------------|-----------------------------------|-----------------|
//! | Plain         | `Rgba8Unorm`, `Rg16Sfloat`        | 1 texel         |
//! | Packed        | `R5g6b5Unorm`, `R4g4b4a4Unorm`    | 1 texel (16bit) |
//! | Depth/stencil | `D32Sfloat`, `D24UnormS8Uint`     | 1 texel         |
//! | Block         | `Bc1RgbUnorm` … `Bc5Snorm`        | 4×4 block       |
//!
//! Missing color channels decode as 0 for R/G/B and 1 for A. Integer formats
//! decode to their numeric value (unnormalized). All multi-byte values are
//! little-endian.

use glam::Vec4;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::errors::{RasterError, Result};
use crate::renderer::state::ColorMask;

/// Pixel storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    Rgb8Unorm,
    Rgb8Snorm,
    Rgb8Uint,
    Rgb8Sint,
    Bgr8Unorm,
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    R16Unorm,
    R16Snorm,
    R16Uint,
    R16Sint,
    R16Sfloat,
    Rg16Unorm,
    Rg16Sfloat,
    Rgba16Unorm,
    Rgba16Uint,
    Rgba16Sfloat,
    R32Uint,
    R32Sint,
    R32Sfloat,
    Rg32Sfloat,
    Rgb32Sfloat,
    Rgba32Uint,
    Rgba32Sfloat,
    R4g4b4a4Unorm,
    R5g6b5Unorm,
    B5g6r5Unorm,
    R5g5b5a1Unorm,
    D32Sfloat,
    D24UnormS8Uint,
    S8Uint,
    Bc1RgbUnorm,
    Bc1RgbaUnorm,
    Bc2Unorm,
    Bc3Unorm,
    Bc4Unorm,
    Bc4Snorm,
    Bc5Unorm,
    Bc5Snorm,
}

/// Scalar encoding of one channel of a plain format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Unorm8,
    Snorm8,
    Uint8,
    Sint8,
    Unorm16,
    Snorm16,
    Uint16,
    Sint16,
    Sfloat16,
    Uint32,
    Sint32,
    Sfloat32,
}

impl Component {
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Unorm8 | Self::Snorm8 | Self::Uint8 | Self::Sint8 => 1,
            Self::Unorm16 | Self::Snorm16 | Self::Uint16 | Self::Sint16 | Self::Sfloat16 => 2,
            Self::Uint32 | Self::Sint32 | Self::Sfloat32 => 4,
        }
    }

    fn decode(self, b: &[u8]) -> f32 {
        match self {
            Self::Unorm8 => f32::from(b[0]) / 255.0,
            Self::Snorm8 => (f32::from(b[0] as i8) / 127.0).max(-1.0),
            Self::Uint8 => f32::from(b[0]),
            Self::Sint8 => f32::from(b[0] as i8),
            Self::Unorm16 => f32::from(u16::from_le_bytes([b[0], b[1]])) / 65535.0,
            Self::Snorm16 => (f32::from(i16::from_le_bytes([b[0], b[1]])) / 32767.0).max(-1.0),
            Self::Uint16 => f32::from(u16::from_le_bytes([b[0], b[1]])),
            Self::Sint16 => f32::from(i16::from_le_bytes([b[0], b[1]])),
            Self::Sfloat16 => f16::from_le_bytes([b[0], b[1]]).to_f32(),
            Self::Uint32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            Self::Sint32 => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32,
            Self::Sfloat32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        }
    }

    fn encode(self, v: f32, out: &mut [u8]) {
        match self {
            Self::Unorm8 => out[0] = (v.clamp(0.0, 1.0) * 255.0).round() as u8,
            Self::Snorm8 => out[0] = (v.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8,
            Self::Uint8 => out[0] = v.round() as u8,
            Self::Sint8 => out[0] = v.round() as i8 as u8,
            Self::Unorm16 => {
                out[..2].copy_from_slice(&((v.clamp(0.0, 1.0) * 65535.0).round() as u16).to_le_bytes());
            }
            Self::Snorm16 => {
                out[..2].copy_from_slice(&((v.clamp(-1.0, 1.0) * 32767.0).round() as i16).to_le_bytes());
            }
            Self::Uint16 => out[..2].copy_from_slice(&(v.round() as u16).to_le_bytes()),
            Self::Sint16 => out[..2].copy_from_slice(&(v.round() as i16).to_le_bytes()),
            Self::Sfloat16 => out[..2].copy_from_slice(&f16::from_f32(v).to_le_bytes()),
            Self::Uint32 => out[..4].copy_from_slice(&(v.round() as u32).to_le_bytes()),
            Self::Sint32 => out[..4].copy_from_slice(&(v.round() as i32).to_le_bytes()),
            Self::Sfloat32 => out[..4].copy_from_slice(&v.to_le_bytes()),
        }
    }
}

/// 16-bit packed color layouts: `(shift, bits)` per RGBA channel, `bits == 0`
/// for absent channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packed {
    pub fields: [(u8, u8); 4],
}

/// Block-compressed families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Bc1 { alpha: bool },
    Bc2,
    Bc3,
    Bc4 { signed: bool },
    Bc5 { signed: bool },
}

impl BlockKind {
    #[inline]
    #[must_use]
    pub const fn block_size(self) -> usize {
        match self {
            Self::Bc1 { .. } | Self::Bc4 { .. } => 8,
            Self::Bc2 | Self::Bc3 | Self::Bc5 { .. } => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    Plain {
        component: Component,
        channels: u8,
        /// Red and blue swapped in memory.
        bgr: bool,
    },
    Packed(Packed),
    Depth32,
    Depth24Stencil8,
    Stencil8,
    Block(BlockKind),
}

const fn plain(component: Component, channels: u8) -> Layout {
    Layout::Plain {
        component,
        channels,
        bgr: false,
    }
}

impl Format {
    #[must_use]
    pub const fn layout(self) -> Layout {
        use Component as C;
        match self {
            Self::R8Unorm => plain(C::Unorm8, 1),
            Self::R8Snorm => plain(C::Snorm8, 1),
            Self::R8Uint => plain(C::Uint8, 1),
            Self::R8Sint => plain(C::Sint8, 1),
            Self::Rg8Unorm => plain(C::Unorm8, 2),
            Self::Rg8Snorm => plain(C::Snorm8, 2),
            Self::Rg8Uint => plain(C::Uint8, 2),
            Self::Rg8Sint => plain(C::Sint8, 2),
            Self::Rgb8Unorm => plain(C::Unorm8, 3),
            Self::Rgb8Snorm => plain(C::Snorm8, 3),
            Self::Rgb8Uint => plain(C::Uint8, 3),
            Self::Rgb8Sint => plain(C::Sint8, 3),
            Self::Bgr8Unorm => Layout::Plain {
                component: C::Unorm8,
                channels: 3,
                bgr: true,
            },
            Self::Rgba8Unorm => plain(C::Unorm8, 4),
            Self::Rgba8Snorm => plain(C::Snorm8, 4),
            Self::Rgba8Uint => plain(C::Uint8, 4),
            Self::Rgba8Sint => plain(C::Sint8, 4),
            Self::Bgra8Unorm => Layout::Plain {
                component: C::Unorm8,
                channels: 4,
                bgr: true,
            },
            Self::R16Unorm => plain(C::Unorm16, 1),
            Self::R16Snorm => plain(C::Snorm16, 1),
            Self::R16Uint => plain(C::Uint16, 1),
            Self::R16Sint => plain(C::Sint16, 1),
            Self::R16Sfloat => plain(C::Sfloat16, 1),
            Self::Rg16Unorm => plain(C::Unorm16, 2),
            Self::Rg16Sfloat => plain(C::Sfloat16, 2),
            Self::Rgba16Unorm => plain(C::Unorm16, 4),
            Self::Rgba16Uint => plain(C::Uint16, 4),
            Self::Rgba16Sfloat => plain(C::Sfloat16, 4),
            Self::R32Uint => plain(C::Uint32, 1),
            Self::R32Sint => plain(C::Sint32, 1),
            Self::R32Sfloat => plain(C::Sfloat32, 1),
            Self::Rg32Sfloat => plain(C::Sfloat32, 2),
            Self::Rgb32Sfloat => plain(C::Sfloat32, 3),
            Self::Rgba32Uint => plain(C::Uint32, 4),
            Self::Rgba32Sfloat => plain(C::Sfloat32, 4),
            Self::R4g4b4a4Unorm => Layout::Packed(Packed {
                fields: [(12, 4), (8, 4), (4, 4), (0, 4)],
            }),
            Self::R5g6b5Unorm => Layout::Packed(Packed {
                fields: [(11, 5), (5, 6), (0, 5), (0, 0)],
            }),
            Self::B5g6r5Unorm => Layout::Packed(Packed {
                fields: [(0, 5), (5, 6), (11, 5), (0, 0)],
            }),
            Self::R5g5b5a1Unorm => Layout::Packed(Packed {
                fields: [(11, 5), (6, 5), (1, 5), (0, 1)],
            }),
            Self::D32Sfloat => Layout::Depth32,
            Self::D24UnormS8Uint => Layout::Depth24Stencil8,
            Self::S8Uint => Layout::Stencil8,
            Self::Bc1RgbUnorm => Layout::Block(BlockKind::Bc1 { alpha: false }),
            Self::Bc1RgbaUnorm => Layout::Block(BlockKind::Bc1 { alpha: true }),
            Self::Bc2Unorm => Layout::Block(BlockKind::Bc2),
            Self::Bc3Unorm => Layout::Block(BlockKind::Bc3),
            Self::Bc4Unorm => Layout::Block(BlockKind::Bc4 { signed: false }),
            Self::Bc4Snorm => Layout::Block(BlockKind::Bc4 { signed: true }),
            Self::Bc5Unorm => Layout::Block(BlockKind::Bc5 { signed: false }),
            Self::Bc5Snorm => Layout::Block(BlockKind::Bc5 { signed: true }),
        }
    }

    /// Bytes per texel, or per 4×4 block for compressed formats.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self.layout() {
            Layout::Plain {
                component,
                channels,
                ..
            } => component.size() * channels as usize,
            Layout::Packed(_) => 2,
            Layout::Depth32 | Layout::Depth24Stencil8 => 4,
            Layout::Stencil8 => 1,
            Layout::Block(kind) => kind.block_size(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        matches!(self.layout(), Layout::Block(_))
    }

    /// Width and height of the storage unit in texels.
    #[inline]
    #[must_use]
    pub const fn block_extent(self) -> u32 {
        if self.is_compressed() { 4 } else { 1 }
    }

    #[inline]
    #[must_use]
    pub const fn has_depth(self) -> bool {
        matches!(self.layout(), Layout::Depth32 | Layout::Depth24Stencil8)
    }

    #[inline]
    #[must_use]
    pub const fn has_stencil(self) -> bool {
        matches!(self.layout(), Layout::Depth24Stencil8 | Layout::Stencil8)
    }

    #[inline]
    #[must_use]
    pub const fn is_color_renderable(self) -> bool {
        matches!(self.layout(), Layout::Plain { .. } | Layout::Packed(_))
    }

    /// Bytes needed for a `width × height × depth` region.
    #[must_use]
    pub fn region_size(self, width: u32, height: u32, depth: u32) -> usize {
        let e = self.block_extent();
        let (bw, bh) = (width.div_ceil(e) as usize, height.div_ceil(e) as usize);
        bw * bh * depth as usize * self.stride()
    }

    // ── Decoding ─────────────────────────────────────────────────────────────

    /// Decodes one uncompressed texel starting at `bytes[0]`.
    ///
    /// Returns `None` for block formats, which decode through
    /// [`bc::decode_block`](super::bc::decode_block), or if `bytes` is short.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<Vec4> {
        let bytes = bytes.get(..self.stride())?;
        let texel = match self.layout() {
            Layout::Plain {
                component,
                channels,
                bgr,
            } => {
                let mut out = [0.0, 0.0, 0.0, 1.0];
                let size = component.size();
                for (c, chunk) in bytes.chunks_exact(size).take(channels as usize).enumerate() {
                    out[c] = component.decode(chunk);
                }
                if bgr {
                    out.swap(0, 2);
                }
                Vec4::from_array(out)
            }
            Layout::Packed(packed) => {
                let bits = u16::from_le_bytes([bytes[0], bytes[1]]);
                let mut out = [0.0, 0.0, 0.0, 1.0];
                for (c, &(shift, width)) in packed.fields.iter().enumerate() {
                    if width > 0 {
                        let max = (1u16 << width) - 1;
                        out[c] = f32::from((bits >> shift) & max) / f32::from(max);
                    }
                }
                Vec4::from_array(out)
            }
            Layout::Depth32 | Layout::Depth24Stencil8 => {
                Vec4::new(self.read_depth(bytes)?, 0.0, 0.0, 1.0)
            }
            Layout::Stencil8 => Vec4::new(f32::from(bytes[0]), 0.0, 0.0, 1.0),
            Layout::Block(_) => return None,
        };
        Some(texel)
    }

    // ── Encoding ─────────────────────────────────────────────────────────────

    /// Writes the channels of `color` selected by `mask` into `out`,
    /// preserving the others.
    pub fn encode(self, color: Vec4, mask: ColorMask, out: &mut [u8]) -> Result<()> {
        let stride = self.stride();
        let Some(out) = out.get_mut(..stride) else {
            return Err(RasterError::InvalidImage(format!(
                "texel write of {stride} bytes out of bounds"
            )));
        };
        let channels = mask.channels();
        match self.layout() {
            Layout::Plain {
                component,
                channels: count,
                bgr,
            } => {
                let mut values = color.to_array();
                let mut enabled = channels;
                if bgr {
                    values.swap(0, 2);
                    enabled.swap(0, 2);
                }
                let size = component.size();
                for (c, chunk) in out.chunks_exact_mut(size).take(count as usize).enumerate() {
                    if enabled[c] {
                        component.encode(values[c], chunk);
                    }
                }
                Ok(())
            }
            Layout::Packed(packed) => {
                let mut bits = u16::from_le_bytes([out[0], out[1]]);
                for (c, &(shift, width)) in packed.fields.iter().enumerate() {
                    if width > 0 && channels[c] {
                        let max = (1u16 << width) - 1;
                        let v = (color[c].clamp(0.0, 1.0) * f32::from(max)).round() as u16;
                        bits = (bits & !(max << shift)) | ((v & max) << shift);
                    }
                }
                out.copy_from_slice(&bits.to_le_bytes());
                Ok(())
            }
            _ => Err(RasterError::UnsupportedRenderTarget {
                format: self,
                aspect: "color",
            }),
        }
    }

    // ── Depth / Stencil ──────────────────────────────────────────────────────

    /// Depth value of a depth texel, `None` if the format has no depth.
    #[must_use]
    pub fn read_depth(self, bytes: &[u8]) -> Option<f32> {
        let b = bytes.get(..4)?;
        match self.layout() {
            Layout::Depth32 => Some(f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            Layout::Depth24Stencil8 => {
                let packed = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                Some((packed & 0x00ff_ffff) as f32 / 16_777_215.0)
            }
            _ => None,
        }
    }

    pub fn write_depth(self, depth: f32, out: &mut [u8]) -> Result<()> {
        let unsupported = RasterError::UnsupportedRenderTarget {
            format: self,
            aspect: "depth",
        };
        let Some(b) = out.get_mut(..4) else {
            return Err(unsupported);
        };
        match self.layout() {
            Layout::Depth32 => b.copy_from_slice(&depth.to_le_bytes()),
            Layout::Depth24Stencil8 => {
                let old = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                let d = (depth.clamp(0.0, 1.0) * 16_777_215.0).round() as u32;
                b.copy_from_slice(&((old & 0xff00_0000) | d).to_le_bytes());
            }
            _ => return Err(unsupported),
        }
        Ok(())
    }

    #[must_use]
    pub fn read_stencil(self, bytes: &[u8]) -> Option<u8> {
        match self.layout() {
            Layout::Depth24Stencil8 => bytes.get(3).copied(),
            Layout::Stencil8 => bytes.first().copied(),
            _ => None,
        }
    }

    pub fn write_stencil(self, value: u8, out: &mut [u8]) -> Result<()> {
        let index = match self.layout() {
            Layout::Depth24Stencil8 => 3,
            Layout::Stencil8 => 0,
            _ => usize::MAX,
        };
        match out.get_mut(index) {
            Some(b) => {
                *b = value;
                Ok(())
            }
            None => Err(RasterError::UnsupportedRenderTarget {
                format: self,
                aspect: "stencil",
            }),
        }
    }
}
