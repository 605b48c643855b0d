//! Compiled blend/write units.
//!
//! A [`CompiledUnit`] owns the code buffer produced by lowering one blend
//! program and executes it on a small register machine. Execution state
//! (registers and array slots) lives on the caller's stack, so a unit is
//! immutable after compilation and may be invoked from several threads at
//! once as long as each invocation targets its own pixel.

use std::fmt;

use super::codegen::blend::ENTRY_PARAMS;
use super::codegen::compile::{MAX_REGS, MAX_SLOTS, Op, ParamBinding, Program};
use crate::errors::{RasterError, Result};
use crate::renderer::state::PipelineState;

/// RGBA color as handed to and from blend units.
pub type Rgba = [f32; 4];

/// Executable blend/write unit for one [`PipelineState`].
pub struct CompiledUnit {
    program: Program,
    state: PipelineState,
    fingerprint: u32,
    color_buf: usize,
    depth_buf: usize,
    color: usize,
    depth: usize,
    constant: usize,
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("fingerprint", &format_args!("{:#010x}", self.fingerprint))
            .field("ops", &self.program.code().len())
            .field("regs", &self.program.num_regs)
            .field("slots", &self.program.num_slots)
            .finish_non_exhaustive()
    }
}

impl CompiledUnit {
    /// Wraps a lowered program whose entry has the `fragment_set` signature.
    pub fn new(program: Program, state: PipelineState, fingerprint: u32) -> Result<Self> {
        let kinds: Vec<_> = program.params().iter().map(|(kind, _)| *kind).collect();
        if kinds != ENTRY_PARAMS {
            return Err(RasterError::Compile(format!(
                "entry signature {kinds:?} does not match {ENTRY_PARAMS:?}"
            )));
        }
        if program.num_regs > MAX_REGS || program.num_slots > MAX_SLOTS {
            return Err(RasterError::Compile("program exceeds the executor frame".into()));
        }

        let binding = |index: usize| match program.params()[index].1 {
            ParamBinding::Slot(s) => usize::from(s),
            ParamBinding::Reg(r) => usize::from(r),
        };
        Ok(Self {
            color_buf: binding(0),
            depth_buf: binding(1),
            color: binding(2),
            depth: binding(3),
            constant: binding(4),
            state,
            fingerprint,
            program,
        })
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Size of the owned code buffer in bytes.
    #[must_use]
    pub fn code_size(&self) -> usize {
        std::mem::size_of_val(self.program.code())
    }

    /// Blends `color` into `color_buf` and optionally stores `depth` into
    /// `depth_buf`, exactly as the unit's state prescribes.
    pub fn invoke(
        &self,
        color_buf: &mut Rgba,
        depth_buf: &mut f32,
        color: &Rgba,
        depth: f32,
        constant: &Rgba,
    ) {
        let mut regs = [0.0f32; MAX_REGS];
        let mut slots = [[0.0f32; 4]; MAX_SLOTS];
        slots[self.color_buf] = *color_buf;
        slots[self.depth_buf][0] = *depth_buf;
        slots[self.color] = *color;
        slots[self.constant] = *constant;
        regs[self.depth] = depth;

        self.execute(&mut regs, &mut slots);

        *color_buf = slots[self.color_buf];
        *depth_buf = slots[self.depth_buf][0];
    }

    fn execute(&self, regs: &mut [f32; MAX_REGS], slots: &mut [[f32; 4]; MAX_SLOTS]) {
        let code = self.program.code();
        let mut pc = 0usize;
        // Lowering guarantees forward-only jumps and a trailing return.
        while let Some(op) = code.get(pc) {
            pc += 1;
            match *op {
                Op::Const { dst, value } => regs[usize::from(dst)] = value,
                Op::Load { dst, slot, lane } => {
                    regs[usize::from(dst)] = slots[usize::from(slot)][usize::from(lane)];
                }
                Op::Store { slot, lane, src } => {
                    slots[usize::from(slot)][usize::from(lane)] = regs[usize::from(src)];
                }
                Op::Move { dst, src } => regs[usize::from(dst)] = regs[usize::from(src)],
                Op::Binary { op, dst, lhs, rhs } => {
                    regs[usize::from(dst)] = op.eval(regs[usize::from(lhs)], regs[usize::from(rhs)]);
                }
                Op::Jump { target } => pc = target as usize,
                Op::Branch {
                    op,
                    lhs,
                    rhs,
                    then_target,
                    else_target,
                } => {
                    pc = if op.eval(regs[usize::from(lhs)], regs[usize::from(rhs)]) {
                        then_target as usize
                    } else {
                        else_target as usize
                    };
                }
                Op::Return => return,
            }
        }
    }
}
