//! BC1–BC5 block decoding.
//!
//! Each decoder expands one 4×4 block into 16 RGBA texels in row-major order
//! (`index = x + 4 * y`).
//!
//! | Format | Bytes | Contents                                        |
//! |--------|-------|-------------------------------------------------|
//! | BC1    | 8     | two RGB565 endpoints + 2-bit indices            |
//! | BC2    | 16    | 4-bit explicit alpha + BC1 color block          |
//! | BC3    | 16    | interpolated alpha block + BC1 color block      |
//! | BC4    | 8     | one interpolated channel (red)                  |
//! | BC5    | 16    | two interpolated channels (red, green)          |

use glam::Vec4;

use super::format::BlockKind;

/// Decoded 4×4 block.
pub type BlockTexels = [Vec4; 16];

/// Decodes `block` (at least [`BlockKind::block_size`] bytes).
///
/// Returns `None` if the slice is too short.
#[must_use]
pub fn decode_block(kind: BlockKind, block: &[u8]) -> Option<BlockTexels> {
    let block = block.get(..kind.block_size())?;
    let texels = match kind {
        BlockKind::Bc1 { alpha } => {
            let black_alpha = if alpha { 0.0 } else { 1.0 };
            decode_color(chunk8(block, 0)?, Some(black_alpha))
        }
        BlockKind::Bc2 => {
            let mut out = decode_color(chunk8(block, 8)?, None);
            let bits = u64::from_le_bytes(chunk8(block, 0)?);
            for (i, texel) in out.iter_mut().enumerate() {
                texel.w = ((bits >> (4 * i)) & 0xf) as f32 / 15.0;
            }
            out
        }
        BlockKind::Bc3 => {
            let mut out = decode_color(chunk8(block, 8)?, None);
            let alpha = decode_channel(chunk8(block, 0)?, false);
            for (texel, a) in out.iter_mut().zip(alpha) {
                texel.w = a;
            }
            out
        }
        BlockKind::Bc4 { signed } => {
            decode_channel(chunk8(block, 0)?, signed).map(|r| Vec4::new(r, 0.0, 0.0, 1.0))
        }
        BlockKind::Bc5 { signed } => {
            let red = decode_channel(chunk8(block, 0)?, signed);
            let green = decode_channel(chunk8(block, 8)?, signed);
            let mut out = [Vec4::W; 16];
            for (i, texel) in out.iter_mut().enumerate() {
                *texel = Vec4::new(red[i], green[i], 0.0, 1.0);
            }
            out
        }
    };
    Some(texels)
}

fn chunk8(bytes: &[u8], offset: usize) -> Option<[u8; 8]> {
    bytes.get(offset..offset + 8)?.try_into().ok()
}

#[inline]
fn rgb565(v: u16) -> Vec4 {
    Vec4::new(
        f32::from((v >> 11) & 0x1f) / 31.0,
        f32::from((v >> 5) & 0x3f) / 63.0,
        f32::from(v & 0x1f) / 31.0,
        1.0,
    )
}

/// Decodes a BC1-style color block.
///
/// `punch_through` enables the BC1 three-color mode taken when `c0 <= c1`;
/// index 3 then decodes to black with the given alpha. BC2/BC3 color blocks
/// always use four colors.
fn decode_color(block: [u8; 8], punch_through: Option<f32>) -> BlockTexels {
    let e0 = u16::from_le_bytes([block[0], block[1]]);
    let e1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let (c0, c1) = (rgb565(e0), rgb565(e1));

    let palette = match punch_through {
        Some(black_alpha) if e0 <= e1 => [
            c0,
            c1,
            (c0 + c1) / 2.0,
            Vec4::new(0.0, 0.0, 0.0, black_alpha),
        ],
        _ => [c0, c1, (c0 * 2.0 + c1) / 3.0, (c0 + c1 * 2.0) / 3.0],
    };

    let mut out = [Vec4::ZERO; 16];
    for (i, texel) in out.iter_mut().enumerate() {
        *texel = palette[((indices >> (2 * i)) & 3) as usize];
    }
    out
}

/// Decodes a BC3 alpha / BC4 channel block.
fn decode_channel(block: [u8; 8], signed: bool) -> [f32; 16] {
    let (v0, v1) = if signed {
        (
            (f32::from(block[0] as i8) / 127.0).max(-1.0),
            (f32::from(block[1] as i8) / 127.0).max(-1.0),
        )
    } else {
        (f32::from(block[0]) / 255.0, f32::from(block[1]) / 255.0)
    };
    let (lo, hi) = if signed { (-1.0, 1.0) } else { (0.0, 1.0) };
    let eight_step = if signed {
        (block[0] as i8) > (block[1] as i8)
    } else {
        block[0] > block[1]
    };

    let mut palette = [0.0f32; 8];
    palette[0] = v0;
    palette[1] = v1;
    if eight_step {
        for (i, p) in palette.iter_mut().enumerate().skip(2) {
            let t = (i - 1) as f32;
            *p = ((7.0 - t) * v0 + t * v1) / 7.0;
        }
    } else {
        for (i, p) in palette.iter_mut().enumerate().take(6).skip(2) {
            let t = (i - 1) as f32;
            *p = ((5.0 - t) * v0 + t * v1) / 5.0;
        }
        palette[6] = lo;
        palette[7] = hi;
    }

    let mut bits = [0u8; 8];
    bits[..6].copy_from_slice(&block[2..8]);
    let indices = u64::from_le_bytes(bits);
    let mut out = [0.0f32; 16];
    for (i, v) in out.iter_mut().enumerate() {
        *v = palette[((indices >> (3 * i)) & 7) as usize];
    }
    out
}
