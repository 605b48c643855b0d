//! Blend program emission.
//!
//! Every blend factor, equation and color mask becomes a small helper
//! function; the entry function sequences them:
//!
//! ```text
//! fragment_set(color_buf, depth_buf, color, depth, constant)
//!   blending active:
//!     rgb_src   (tmp_src, color,     color, color_buf, constant)
//!     rgb_dst   (tmp_dst, color_buf, color, color_buf, constant)
//!     alpha_src (tmp_src, color,     color, color_buf, constant)
//!     alpha_dst (tmp_dst, color_buf, color, color_buf, constant)
//!     eq_rgb    (tmp_res, tmp_src, tmp_dst)
//!     eq_alpha  (tmp_res, tmp_src, tmp_dst)
//!     mask      (color_buf, tmp_res)
//!   otherwise:
//!     mask      (color_buf, color)
//!   depth_write: depth_buf[0] = depth
//! ```
//!
//! Helpers are deduplicated per module, so a state using the same factor for
//! source and destination emits that factor once.

use rustc_hash::FxHashMap;

use super::builder::FunctionBuilder;
use super::ir::{Arg, Array, CmpOp, FuncId, LocalId, Module, ParamKind, Place, Value};
use crate::errors::Result;
use crate::renderer::state::{BlendEquation, BlendFactor, ColorMask, PipelineState};

// ─── Signatures ──────────────────────────────────────────────────────────────

/// Entry parameter indices.
pub const ENTRY_COLOR_BUF: u8 = 0;
pub const ENTRY_DEPTH_BUF: u8 = 1;
pub const ENTRY_COLOR: u8 = 2;
pub const ENTRY_DEPTH: u8 = 3;
pub const ENTRY_CONSTANT: u8 = 4;

/// `fragment_set(float4 *color_buf, float *depth_buf, const float4 *color, float depth, const float4 *constant)`
pub const ENTRY_PARAMS: [ParamKind; 5] = [
    ParamKind::Vec4Ptr,
    ParamKind::ScalarPtr,
    ParamKind::Vec4Ptr,
    ParamKind::Scalar,
    ParamKind::Vec4Ptr,
];

// Factor helper: (res, org, src, dst, constant)
const F_RES: u8 = 0;
const F_ORG: u8 = 1;
const F_SRC: u8 = 2;
const F_DST: u8 = 3;
const F_CONSTANT: u8 = 4;
const FACTOR_PARAMS: [ParamKind; 5] = [ParamKind::Vec4Ptr; 5];

// Equation helper: (res, src, dst)
const E_RES: u8 = 0;
const E_SRC: u8 = 1;
const E_DST: u8 = 2;
const EQUATION_PARAMS: [ParamKind; 3] = [ParamKind::Vec4Ptr; 3];

// Mask helper: (dst, src)
const M_DST: u8 = 0;
const M_SRC: u8 = 1;
const MASK_PARAMS: [ParamKind; 2] = [ParamKind::Vec4Ptr; 2];

const RGB: std::ops::Range<u8> = 0..3;
const ALPHA: std::ops::Range<u8> = 3..4;

// ─── Helper Keys ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HelperKey {
    RgbFactor(BlendFactor),
    AlphaFactor(BlendFactor),
    RgbEquation(BlendEquation),
    AlphaEquation(BlendEquation),
    Mask(ColorMask),
}

/// Emits the blend program for one pipeline state.
pub(crate) struct BlendEmitter<'m> {
    module: &'m mut Module,
    helpers: FxHashMap<HelperKey, FuncId>,
}

impl<'m> BlendEmitter<'m> {
    pub(crate) fn new(module: &'m mut Module) -> Self {
        Self {
            module,
            helpers: FxHashMap::default(),
        }
    }

    /// Emits `fragment_set` and every helper it calls; returns the entry.
    pub(crate) fn emit(mut self, state: &PipelineState) -> Result<FuncId> {
        let a = &state.attachment;
        let mask = self.helper(HelperKey::Mask(a.color_mask))?;
        let calls = if state.blending_active() {
            Some([
                self.helper(HelperKey::RgbFactor(a.src_rgb))?,
                self.helper(HelperKey::RgbFactor(a.dst_rgb))?,
                self.helper(HelperKey::AlphaFactor(a.src_alpha))?,
                self.helper(HelperKey::AlphaFactor(a.dst_alpha))?,
                self.helper(HelperKey::RgbEquation(a.eq_rgb))?,
                self.helper(HelperKey::AlphaEquation(a.eq_alpha))?,
            ])
        } else {
            None
        };

        let mut b = self.module.build_function("fragment_set", &ENTRY_PARAMS);
        let color_buf = b.param_array(ENTRY_COLOR_BUF);
        let depth_buf = b.param_array(ENTRY_DEPTH_BUF);
        let color = b.param_array(ENTRY_COLOR);
        let constant = b.param_array(ENTRY_CONSTANT);

        match calls {
            Some([src_rgb, dst_rgb, src_alpha, dst_alpha, eq_rgb, eq_alpha]) => {
                let tmp_src = b.new_array();
                let tmp_dst = b.new_array();
                let tmp_res = b.new_array();
                let factor_args = |res: Array, org: Array| {
                    [res, org, color, color_buf, constant].map(Arg::Array)
                };
                b.call(src_rgb, factor_args(tmp_src, color));
                b.call(dst_rgb, factor_args(tmp_dst, color_buf));
                b.call(src_alpha, factor_args(tmp_src, color));
                b.call(dst_alpha, factor_args(tmp_dst, color_buf));
                b.call(eq_rgb, [tmp_res, tmp_src, tmp_dst].map(Arg::Array));
                b.call(eq_alpha, [tmp_res, tmp_src, tmp_dst].map(Arg::Array));
                b.call(mask, [color_buf, tmp_res].map(Arg::Array));
            }
            None => b.call(mask, [color_buf, color].map(Arg::Array)),
        }

        if state.depth_write {
            let depth = b.param(ENTRY_DEPTH);
            b.store(depth_buf, 0, depth);
        }
        b.ret();
        let entry = b.finish()?;
        self.module.set_entry(entry);
        Ok(entry)
    }

    fn helper(&mut self, key: HelperKey) -> Result<FuncId> {
        if let Some(&id) = self.helpers.get(&key) {
            return Ok(id);
        }
        let id = match key {
            HelperKey::RgbFactor(f) => emit_factor(self.module, format!("rgb_{f:?}"), f, RGB)?,
            HelperKey::AlphaFactor(f) => {
                emit_factor(self.module, format!("alpha_{f:?}"), f, ALPHA)?
            }
            HelperKey::RgbEquation(e) => {
                emit_equation(self.module, format!("eq_rgb_{e:?}"), e, RGB)?
            }
            HelperKey::AlphaEquation(e) => {
                emit_equation(self.module, format!("eq_alpha_{e:?}"), e, ALPHA)?
            }
            HelperKey::Mask(m) => emit_color_mask(self.module, m)?,
        };
        self.helpers.insert(key, id);
        Ok(id)
    }
}

// ─── Factors ─────────────────────────────────────────────────────────────────

/// Local holding `min(src_alpha, 1 - dst_alpha)` in saturate helpers.
const SATURATE: LocalId = LocalId(0);

/// How a factor scales `org[lane]`.
enum FactorTerm {
    Zero,
    Identity,
    Scale(Value),
}

/// Scale term of `factor` for one lane. For the alpha lane every *_COLOR
/// factor naturally reads the alpha channel.
fn factor_term(factor: BlendFactor, lane: u8) -> FactorTerm {
    let src = Array::Param(F_SRC);
    let dst = Array::Param(F_DST);
    let constant = Array::Param(F_CONSTANT);
    let one = || Value::Const(1.0);
    match factor {
        BlendFactor::Zero => FactorTerm::Zero,
        BlendFactor::One => FactorTerm::Identity,
        BlendFactor::SrcColor => FactorTerm::Scale(Value::load(src, lane)),
        BlendFactor::OneMinusSrcColor => FactorTerm::Scale(one() - Value::load(src, lane)),
        BlendFactor::DstColor => FactorTerm::Scale(Value::load(dst, lane)),
        BlendFactor::OneMinusDstColor => FactorTerm::Scale(one() - Value::load(dst, lane)),
        BlendFactor::SrcAlpha => FactorTerm::Scale(Value::load(src, 3)),
        BlendFactor::OneMinusSrcAlpha => FactorTerm::Scale(one() - Value::load(src, 3)),
        BlendFactor::DstAlpha => FactorTerm::Scale(Value::load(dst, 3)),
        BlendFactor::OneMinusDstAlpha => FactorTerm::Scale(one() - Value::load(dst, 3)),
        BlendFactor::ConstantColor => FactorTerm::Scale(Value::load(constant, lane)),
        BlendFactor::OneMinusConstantColor => {
            FactorTerm::Scale(one() - Value::load(constant, lane))
        }
        BlendFactor::ConstantAlpha => FactorTerm::Scale(Value::load(constant, 3)),
        BlendFactor::OneMinusConstantAlpha => FactorTerm::Scale(one() - Value::load(constant, 3)),
        BlendFactor::SrcAlphaSaturate => FactorTerm::Scale(Value::Local(SATURATE)),
    }
}

fn emit_factor(
    module: &mut Module,
    name: String,
    factor: BlendFactor,
    lanes: std::ops::Range<u8>,
) -> Result<FuncId> {
    let mut b = module.build_function(name, &FACTOR_PARAMS);
    let res = b.param_array(F_RES);
    let org = b.param_array(F_ORG);

    if factor == BlendFactor::SrcAlphaSaturate {
        emit_saturate(&mut b);
    }
    for lane in lanes {
        let value = match factor_term(factor, lane) {
            FactorTerm::Zero => Value::Const(0.0),
            FactorTerm::Identity => Value::load(org, lane),
            FactorTerm::Scale(scale) => Value::load(org, lane) * scale,
        };
        b.store(res, lane, value);
    }

    b.ret();
    b.finish()
}

/// Defines [`SATURATE`] with an explicit branch and leaves the builder in the
/// join block.
fn emit_saturate(b: &mut FunctionBuilder<'_>) {
    let src = b.param_array(F_SRC);
    let dst = b.param_array(F_DST);
    let saturate = b.new_local();
    debug_assert_eq!(saturate, SATURATE);
    let take_src = b.new_block();
    let take_dst = b.new_block();
    let join = b.new_block();

    b.branch(
        CmpOp::Le,
        Value::load(src, 3),
        Value::Const(1.0) - Value::load(dst, 3),
        take_src,
        take_dst,
    );

    b.switch_to(take_src);
    b.assign(Place::Local(saturate), Value::load(src, 3));
    b.jump(join);

    b.switch_to(take_dst);
    b.assign(
        Place::Local(saturate),
        Value::Const(1.0) - Value::load(dst, 3),
    );
    b.jump(join);

    b.switch_to(join);
}

// ─── Equations ───────────────────────────────────────────────────────────────

fn emit_equation(
    module: &mut Module,
    name: String,
    equation: BlendEquation,
    lanes: std::ops::Range<u8>,
) -> Result<FuncId> {
    let mut b = module.build_function(name, &EQUATION_PARAMS);
    let res = b.param_array(E_RES);
    let src = b.param_array(E_SRC);
    let dst = b.param_array(E_DST);

    let select = match equation {
        BlendEquation::Min => Some(CmpOp::Le),
        BlendEquation::Max => Some(CmpOp::Ge),
        _ => None,
    };

    for lane in lanes {
        let (s, d) = (Value::load(src, lane), Value::load(dst, lane));
        if let Some(op) = select {
            // One explicit branch per channel.
            let take_src = b.new_block();
            let take_dst = b.new_block();
            let next = b.new_block();
            b.branch(op, s.clone(), d.clone(), take_src, take_dst);
            b.switch_to(take_src);
            b.store(res, lane, s);
            b.jump(next);
            b.switch_to(take_dst);
            b.store(res, lane, d);
            b.jump(next);
            b.switch_to(next);
        } else {
            let value = match equation {
                BlendEquation::Subtract => s - d,
                BlendEquation::ReverseSubtract => d - s,
                _ => s + d,
            };
            b.store(res, lane, value);
        }
    }

    b.ret();
    b.finish()
}

// ─── Color Mask ──────────────────────────────────────────────────────────────

fn emit_color_mask(module: &mut Module, mask: ColorMask) -> Result<FuncId> {
    let mut b = module.build_function(format!("color_mask_{:x}", mask.bits()), &MASK_PARAMS);
    let dst = b.param_array(M_DST);
    let src = b.param_array(M_SRC);
    for (lane, enabled) in (0u8..).zip(mask.channels()) {
        if enabled {
            b.store(dst, lane, Value::load(src, lane));
        }
    }
    b.ret();
    b.finish()
}
