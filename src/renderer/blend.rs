//! Interpreted blend/write.
//!
//! [`evaluate_blend`] computes directly what a compiled unit for the same
//! [`PipelineState`] computes. It performs the same floating point
//! operations in the same order (including the explicit saturate and
//! min/max selections), so both paths agree bit for bit, NaN and signed
//! zero included. It serves as the oracle for compiled units and as a
//! fallback for callers that do not want to compile.

use std::ops::Range;

use crate::renderer::pipeline::Rgba;
use crate::renderer::state::{BlendEquation, BlendFactor, PipelineState};

const RGB: Range<usize> = 0..3;
const ALPHA: Range<usize> = 3..4;

/// Blends `color` into `color_buf` and stores `depth` as `state` dictates.
pub fn evaluate_blend(
    state: &PipelineState,
    color_buf: &mut Rgba,
    depth_buf: &mut f32,
    color: &Rgba,
    depth: f32,
    constant: &Rgba,
) {
    let a = &state.attachment;
    let merged = if state.blending_active() {
        let dst = *color_buf;
        let mut tmp_src = [0.0; 4];
        let mut tmp_dst = [0.0; 4];
        let mut tmp_res = [0.0; 4];
        scale(a.src_rgb, RGB, &mut tmp_src, color, color, &dst, constant);
        scale(a.dst_rgb, RGB, &mut tmp_dst, &dst, color, &dst, constant);
        scale(a.src_alpha, ALPHA, &mut tmp_src, color, color, &dst, constant);
        scale(a.dst_alpha, ALPHA, &mut tmp_dst, &dst, color, &dst, constant);
        combine(a.eq_rgb, RGB, &mut tmp_res, &tmp_src, &tmp_dst);
        combine(a.eq_alpha, ALPHA, &mut tmp_res, &tmp_src, &tmp_dst);
        tmp_res
    } else {
        *color
    };

    for ((out, value), enabled) in color_buf.iter_mut().zip(merged).zip(a.color_mask.channels()) {
        if enabled {
            *out = value;
        }
    }
    if state.depth_write {
        *depth_buf = depth;
    }
}

/// `res[lane] = org[lane] * factor(lane)` over `lanes`.
fn scale(
    factor: BlendFactor,
    lanes: Range<usize>,
    res: &mut Rgba,
    org: &Rgba,
    src: &Rgba,
    dst: &Rgba,
    constant: &Rgba,
) {
    let saturate = if src[3] <= 1.0 - dst[3] {
        src[3]
    } else {
        1.0 - dst[3]
    };
    for lane in lanes {
        res[lane] = match factor {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => org[lane],
            BlendFactor::SrcColor => org[lane] * src[lane],
            BlendFactor::OneMinusSrcColor => org[lane] * (1.0 - src[lane]),
            BlendFactor::DstColor => org[lane] * dst[lane],
            BlendFactor::OneMinusDstColor => org[lane] * (1.0 - dst[lane]),
            BlendFactor::SrcAlpha => org[lane] * src[3],
            BlendFactor::OneMinusSrcAlpha => org[lane] * (1.0 - src[3]),
            BlendFactor::DstAlpha => org[lane] * dst[3],
            BlendFactor::OneMinusDstAlpha => org[lane] * (1.0 - dst[3]),
            BlendFactor::ConstantColor => org[lane] * constant[lane],
            BlendFactor::OneMinusConstantColor => org[lane] * (1.0 - constant[lane]),
            BlendFactor::ConstantAlpha => org[lane] * constant[3],
            BlendFactor::OneMinusConstantAlpha => org[lane] * (1.0 - constant[3]),
            BlendFactor::SrcAlphaSaturate => org[lane] * saturate,
        };
    }
}

fn combine(equation: BlendEquation, lanes: Range<usize>, res: &mut Rgba, src: &Rgba, dst: &Rgba) {
    for lane in lanes {
        let (s, d) = (src[lane], dst[lane]);
        res[lane] = match equation {
            BlendEquation::Add => s + d,
            BlendEquation::Subtract => s - d,
            BlendEquation::ReverseSubtract => d - s,
            BlendEquation::Min => {
                if s <= d {
                    s
                } else {
                    d
                }
            }
            BlendEquation::Max => {
                if s >= d {
                    s
                } else {
                    d
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::state::{BlendAttachmentState, ColorMask};

    fn blending(attachment: BlendAttachmentState) -> PipelineState {
        PipelineState {
            attachment,
            blend_enabled: true,
            depth_write: false,
        }
    }

    #[test]
    fn test_alpha_over() {
        let state = blending(BlendAttachmentState::ALPHA_BLENDING);
        let mut dst = [0.0, 0.0, 1.0, 1.0];
        let mut depth = 0.5;
        evaluate_blend(&state, &mut dst, &mut depth, &[1.0, 0.0, 0.0, 0.5], 0.1, &[0.0; 4]);
        assert_eq!(&dst[..3], &[0.5, 0.0, 0.5]);
        assert_eq!(depth, 0.5);
    }

    #[test]
    fn test_min_keeps_source_on_ties_and_signed_zero() {
        let mut attachment = BlendAttachmentState::REPLACE;
        attachment.enable = true;
        attachment.eq_rgb = BlendEquation::Min;
        let state = blending(attachment);
        let mut dst = [0.0, 1.0, f32::NAN, 1.0];
        let mut depth = 0.0;
        evaluate_blend(&state, &mut dst, &mut depth, &[-0.0, 1.0, 0.5, 1.0], 0.0, &[0.0; 4]);
        // REPLACE scales destination by ZERO, so min compares against 0.0
        assert!(dst[0].is_sign_negative());
        assert_eq!(dst[1], 0.0);
    }

    #[test]
    fn test_disabled_blend_honors_mask_and_writes_depth() {
        let mut state = PipelineState::default();
        state.attachment.color_mask = ColorMask::R | ColorMask::A;
        state.depth_write = true;
        let mut dst = [0.1, 0.2, 0.3, 0.4];
        let mut depth = 1.0;
        evaluate_blend(&state, &mut dst, &mut depth, &[0.9, 0.8, 0.7, 0.6], 0.25, &[0.0; 4]);
        assert_eq!(dst, [0.9, 0.2, 0.3, 0.6]);
        assert_eq!(depth, 0.25);
    }
}
