//! Pipeline state fingerprinting.
//!
//! A fingerprint is a 32-bit FNV-1a digest of the code-affecting fields of a
//! [`PipelineState`], folded in a fixed canonical order:
//!
//! | # | Field            | Encoding       |
//! |---|------------------|----------------|
//! | 1 | rgb src factor   | `u32` LE       |
//! | 2 | alpha src factor | `u32` LE       |
//! | 3 | rgb dst factor   | `u32` LE       |
//! | 4 | alpha dst factor | `u32` LE       |
//! | 5 | rgb equation     | `u32` LE       |
//! | 6 | alpha equation   | `u32` LE       |
//! | 7 | color mask       | 4 × `u8` (0/1) |
//! | 8 | attachment blend | `u8`           |
//! | 9 | global blend     | `u8`           |
//! |10 | depth write      | `u8`           |
//!
//! Equal states always produce equal fingerprints; the cache still compares
//! every field on lookup.

use std::hash::Hasher;

use crate::renderer::state::PipelineState;
use crate::utils::Fnv32;

/// Types that can be reduced to a stable 32-bit fingerprint.
pub trait StateFingerprint {
    fn fingerprint(&self) -> u32;
}

impl StateFingerprint for PipelineState {
    fn fingerprint(&self) -> u32 {
        let a = &self.attachment;
        let mut h = Fnv32::new();
        h.write_u32(a.src_rgb.raw());
        h.write_u32(a.src_alpha.raw());
        h.write_u32(a.dst_rgb.raw());
        h.write_u32(a.dst_alpha.raw());
        h.write_u32(a.eq_rgb.raw());
        h.write_u32(a.eq_alpha.raw());
        for channel in a.color_mask.channels() {
            h.write_bool(channel);
        }
        h.write_bool(a.enable);
        h.write_bool(self.blend_enabled);
        h.write_bool(self.depth_write);
        h.finish32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::state::{BlendAttachmentState, BlendFactor, ColorMask};

    #[test]
    fn test_fingerprint_is_deterministic() {
        let s = PipelineState {
            attachment: BlendAttachmentState::ALPHA_BLENDING,
            blend_enabled: true,
            depth_write: true,
        };
        let copy = s;
        assert_eq!(s.fingerprint(), copy.fingerprint());
    }

    #[test]
    fn test_every_field_participates() {
        let base = PipelineState::default();
        let mut variants = Vec::new();

        let mut s = base;
        s.attachment.src_rgb = BlendFactor::SrcAlpha;
        variants.push(s);
        let mut s = base;
        s.attachment.dst_alpha = BlendFactor::One;
        variants.push(s);
        let mut s = base;
        s.attachment.color_mask = ColorMask::RGB;
        variants.push(s);
        let mut s = base;
        s.attachment.enable = true;
        variants.push(s);
        let mut s = base;
        s.blend_enabled = true;
        variants.push(s);
        let mut s = base;
        s.depth_write = true;
        variants.push(s);

        for v in &variants {
            assert_ne!(v.fingerprint(), base.fingerprint(), "{v:?}");
        }
    }
}
