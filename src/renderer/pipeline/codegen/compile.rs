//! IR verification and lowering.
//!
//! Turns a [`Module`] into a flat [`Program`] for the register machine in
//! [`CompiledUnit`](crate::renderer::pipeline::CompiledUnit):
//!
//! 1. **Inline**: every call is expanded in place. Callee pointer parameters
//!    are bound to the caller's array slots, scalar parameters to registers,
//!    and `return` becomes a jump to the call's continuation.
//! 2. **Allocate**: arrays get frame slots and scalars get registers with
//!    stack discipline, so callee storage is reused after the call returns.
//! 3. **Resolve**: block labels become absolute code offsets. Only forward
//!    jumps are accepted, which guarantees every program terminates.
//!
//! Any structural problem (unknown callee, argument mismatch, lane out of
//! range, unbound label, recursion, frame overflow) is reported as
//! [`RasterError::Compile`]. The code buffer is reserved fallibly.

use smallvec::SmallVec;

use super::ir::{
    Arg, Array, BinOp, CmpOp, FuncId, Function, Module, ParamKind, Place, Stmt, Terminator, Value,
};
use crate::errors::{RasterError, Result};

/// Register file size of the executor.
pub const MAX_REGS: usize = 64;

/// Array slots of the executor.
pub const MAX_SLOTS: usize = 16;

/// Maximum call nesting; deeper chains are treated as recursion.
const MAX_INLINE_DEPTH: usize = 8;

pub type Reg = u8;
pub type Slot = u8;

// ─── Code ────────────────────────────────────────────────────────────────────

/// One register-machine instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Const { dst: Reg, value: f32 },
    Load { dst: Reg, slot: Slot, lane: u8 },
    Store { slot: Slot, lane: u8, src: Reg },
    Move { dst: Reg, src: Reg },
    Binary { op: BinOp, dst: Reg, lhs: Reg, rhs: Reg },
    Jump { target: u32 },
    Branch {
        op: CmpOp,
        lhs: Reg,
        rhs: Reg,
        then_target: u32,
        else_target: u32,
    },
    Return,
}

/// Where an entry parameter lives during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBinding {
    Slot(Slot),
    Reg(Reg),
}

/// A verified, label-resolved program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) code: Box<[Op]>,
    pub(crate) params: SmallVec<[(ParamKind, ParamBinding); 5]>,
    pub(crate) num_regs: usize,
    pub(crate) num_slots: usize,
}

impl Program {
    #[inline]
    #[must_use]
    pub fn code(&self) -> &[Op] {
        &self.code
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[(ParamKind, ParamBinding)] {
        &self.params
    }

    /// Number of conditional branches in the lowered code.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.code
            .iter()
            .filter(|op| matches!(op, Op::Branch { .. }))
            .count()
    }
}

// ─── Lowering ────────────────────────────────────────────────────────────────

type Label = u32;

/// Op with unresolved jump targets.
#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Op(Op),
    Jump(Label),
    Branch {
        op: CmpOp,
        lhs: Reg,
        rhs: Reg,
        then_label: Label,
        else_label: Label,
    },
}

/// Storage bound to the names of one inlined function instance.
struct Frame<'f> {
    func: &'f Function,
    params: SmallVec<[ParamBinding; 5]>,
    arrays: SmallVec<[Slot; 8]>,
    locals: SmallVec<[Reg; 8]>,
    blocks: Vec<Label>,
    /// `None` for the entry function.
    continuation: Option<Label>,
}

struct Lowering<'m> {
    module: &'m Module,
    ops: Vec<PendingOp>,
    labels: Vec<Option<u32>>,
    /// First register not owned by a live frame.
    reg_top: usize,
    /// First free temporary register of the current statement.
    temp_top: usize,
    max_regs: usize,
    slot_top: usize,
    max_slots: usize,
    call_stack: SmallVec<[FuncId; MAX_INLINE_DEPTH]>,
}

/// Verifies and lowers `module` starting at its entry function.
pub fn lower(module: &Module) -> Result<Program> {
    let entry_id = module
        .entry
        .ok_or_else(|| RasterError::Compile("module has no entry function".into()))?;
    let entry = module
        .function(entry_id)
        .ok_or_else(|| compile_error(format!("entry {entry_id:?} does not exist")))?;

    let mut lowering = Lowering {
        module,
        ops: Vec::new(),
        labels: Vec::new(),
        reg_top: 0,
        temp_top: 0,
        max_regs: 0,
        slot_top: 0,
        max_slots: 0,
        call_stack: SmallVec::new(),
    };

    let mut params = SmallVec::new();
    let mut bindings = SmallVec::new();
    for &kind in &entry.params {
        let binding = match kind {
            ParamKind::Vec4Ptr | ParamKind::ScalarPtr => ParamBinding::Slot(lowering.alloc_slot()?),
            ParamKind::Scalar => ParamBinding::Reg(lowering.alloc_reg()?),
        };
        params.push((kind, binding));
        bindings.push(binding);
    }

    lowering.call_stack.push(entry_id);
    lowering.inline(entry, bindings, None)?;
    lowering.finish(params)
}

fn compile_error(reason: String) -> RasterError {
    RasterError::Compile(reason)
}

impl<'m> Lowering<'m> {
    // ── Allocation ───────────────────────────────────────────────────────────

    fn alloc_reg(&mut self) -> Result<Reg> {
        let reg = self.reg_top;
        if reg >= MAX_REGS {
            return Err(compile_error(format!("more than {MAX_REGS} live registers")));
        }
        self.reg_top += 1;
        self.temp_top = self.reg_top;
        self.max_regs = self.max_regs.max(self.reg_top);
        Ok(reg as Reg)
    }

    fn alloc_temp(&mut self) -> Result<Reg> {
        let reg = self.temp_top;
        if reg >= MAX_REGS {
            return Err(compile_error(format!(
                "expression needs more than {MAX_REGS} registers"
            )));
        }
        self.temp_top += 1;
        self.max_regs = self.max_regs.max(self.temp_top);
        Ok(reg as Reg)
    }

    fn alloc_slot(&mut self) -> Result<Slot> {
        let slot = self.slot_top;
        if slot >= MAX_SLOTS {
            return Err(compile_error(format!("more than {MAX_SLOTS} live arrays")));
        }
        self.slot_top += 1;
        self.max_slots = self.max_slots.max(self.slot_top);
        Ok(slot as Slot)
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        self.labels.len() as Label - 1
    }

    fn bind_label(&mut self, label: Label) {
        self.labels[label as usize] = Some(self.ops.len() as u32);
    }

    fn emit(&mut self, op: Op) {
        self.ops.push(PendingOp::Op(op));
    }

    // ── Functions ────────────────────────────────────────────────────────────

    fn inline(
        &mut self,
        func: &'m Function,
        params: SmallVec<[ParamBinding; 5]>,
        continuation: Option<Label>,
    ) -> Result<()> {
        let (saved_regs, saved_slots) = (self.reg_top, self.slot_top);

        let mut arrays = SmallVec::new();
        for _ in 0..func.num_arrays {
            arrays.push(self.alloc_slot()?);
        }
        let mut locals = SmallVec::new();
        for _ in 0..func.num_locals {
            locals.push(self.alloc_reg()?);
        }
        let blocks = (0..func.blocks.len()).map(|_| self.new_label()).collect();

        let frame = Frame {
            func,
            params,
            arrays,
            locals,
            blocks,
            continuation,
        };

        for (index, block) in func.blocks.iter().enumerate() {
            self.bind_label(frame.blocks[index]);
            for stmt in &block.stmts {
                self.temp_top = self.reg_top;
                self.lower_stmt(&frame, stmt)?;
            }
            self.temp_top = self.reg_top;
            let terminator = block.terminator.as_ref().ok_or_else(|| {
                compile_error(format!("{}: bb{index} has no terminator", func.name))
            })?;
            self.lower_terminator(&frame, terminator)?;
        }

        self.reg_top = saved_regs;
        self.temp_top = saved_regs;
        self.slot_top = saved_slots;
        Ok(())
    }

    fn lower_stmt(&mut self, frame: &Frame<'m>, stmt: &'m Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { dst, value } => {
                let src = self.lower_value(frame, value)?;
                match *dst {
                    Place::Lane { array, lane } => {
                        let slot = self.resolve_array(frame, array, lane)?;
                        self.emit(Op::Store { slot, lane, src });
                    }
                    Place::Local(local) => {
                        let dst = resolve_local(frame, local.0)?;
                        self.emit(Op::Move { dst, src });
                    }
                }
                Ok(())
            }
            Stmt::Call { func, args } => self.lower_call(frame, *func, args),
        }
    }

    fn lower_call(&mut self, frame: &Frame<'m>, id: FuncId, args: &[Arg]) -> Result<()> {
        let module = self.module;
        let callee = module.function(id).ok_or_else(|| {
            compile_error(format!("{}: call to unknown {id:?}", frame.func.name))
        })?;
        if self.call_stack.contains(&id) || self.call_stack.len() >= MAX_INLINE_DEPTH {
            return Err(compile_error(format!(
                "{}: recursive or too deeply nested call to {}",
                frame.func.name, callee.name
            )));
        }
        if callee.params.len() != args.len() {
            return Err(compile_error(format!(
                "{}: {} expects {} arguments, got {}",
                frame.func.name,
                callee.name,
                callee.params.len(),
                args.len()
            )));
        }

        let saved_regs = self.reg_top;
        let mut bindings = SmallVec::new();
        for (index, (kind, arg)) in callee.params.iter().zip(args).enumerate() {
            let binding = match (kind, arg) {
                (ParamKind::Vec4Ptr | ParamKind::ScalarPtr, Arg::Array(array)) => {
                    // The whole addressable range of the callee parameter must
                    // exist in the argument.
                    let last = kind.lanes().saturating_sub(1);
                    ParamBinding::Slot(self.resolve_array(frame, *array, last)?)
                }
                (ParamKind::Scalar, Arg::Value(value)) => {
                    let temp = self.lower_value(frame, value)?;
                    let reg = self.alloc_reg()?;
                    self.emit(Op::Move { dst: reg, src: temp });
                    ParamBinding::Reg(reg)
                }
                _ => {
                    return Err(compile_error(format!(
                        "{}: argument {index} of {} has the wrong kind",
                        frame.func.name, callee.name
                    )));
                }
            };
            bindings.push(binding);
        }

        let continuation = self.new_label();
        self.call_stack.push(id);
        self.inline(callee, bindings, Some(continuation))?;
        self.call_stack.pop();
        self.bind_label(continuation);
        self.reg_top = saved_regs;
        Ok(())
    }

    fn lower_terminator(&mut self, frame: &Frame<'m>, terminator: &'m Terminator) -> Result<()> {
        match terminator {
            Terminator::Return => match frame.continuation {
                Some(label) => self.ops.push(PendingOp::Jump(label)),
                None => self.emit(Op::Return),
            },
            Terminator::Jump(block) => {
                let label = resolve_block(frame, block.index())?;
                self.ops.push(PendingOp::Jump(label));
            }
            Terminator::Branch {
                op,
                lhs,
                rhs,
                then_block,
                else_block,
            } => {
                let lhs = self.lower_value(frame, lhs)?;
                let rhs = self.lower_value(frame, rhs)?;
                let then_label = resolve_block(frame, then_block.index())?;
                let else_label = resolve_block(frame, else_block.index())?;
                self.ops.push(PendingOp::Branch {
                    op: *op,
                    lhs,
                    rhs,
                    then_label,
                    else_label,
                });
            }
        }
        Ok(())
    }

    // ── Values ───────────────────────────────────────────────────────────────

    fn lower_value(&mut self, frame: &Frame<'m>, value: &Value) -> Result<Reg> {
        match value {
            Value::Const(v) => {
                let dst = self.alloc_temp()?;
                self.emit(Op::Const { dst, value: *v });
                Ok(dst)
            }
            Value::Load { array, lane } => {
                let slot = self.resolve_array(frame, *array, *lane)?;
                let dst = self.alloc_temp()?;
                self.emit(Op::Load {
                    dst,
                    slot,
                    lane: *lane,
                });
                Ok(dst)
            }
            Value::Param(index) => match frame.params.get(usize::from(*index)) {
                Some(ParamBinding::Reg(reg)) => Ok(*reg),
                _ => Err(compile_error(format!(
                    "{}: p{index} is not a scalar parameter",
                    frame.func.name
                ))),
            },
            Value::Local(local) => resolve_local(frame, local.0),
            Value::Binary { op, lhs, rhs } => {
                let lhs = self.lower_value(frame, lhs)?;
                let rhs = self.lower_value(frame, rhs)?;
                let dst = self.alloc_temp()?;
                self.emit(Op::Binary {
                    op: *op,
                    dst,
                    lhs,
                    rhs,
                });
                Ok(dst)
            }
        }
    }

    fn resolve_array(&self, frame: &Frame<'m>, array: Array, lane: u8) -> Result<Slot> {
        let (slot, lanes) = match array {
            Array::Param(index) => {
                let index = usize::from(index);
                match (frame.func.params.get(index), frame.params.get(index)) {
                    (Some(kind), Some(ParamBinding::Slot(slot))) => (*slot, kind.lanes()),
                    _ => {
                        return Err(compile_error(format!(
                            "{}: {array} is not a pointer parameter",
                            frame.func.name
                        )));
                    }
                }
            }
            Array::Local(index) => match frame.arrays.get(usize::from(index)) {
                Some(slot) => (*slot, 4),
                None => {
                    return Err(compile_error(format!(
                        "{}: {array} is not declared",
                        frame.func.name
                    )));
                }
            },
        };
        if lane >= lanes {
            return Err(compile_error(format!(
                "{}: lane {lane} out of range for {array}",
                frame.func.name
            )));
        }
        Ok(slot)
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    fn finish(self, params: SmallVec<[(ParamKind, ParamBinding); 5]>) -> Result<Program> {
        let target = |label: Label, at: usize| -> Result<u32> {
            let resolved = self
                .labels
                .get(label as usize)
                .copied()
                .flatten()
                .ok_or_else(|| compile_error(format!("label {label} was never bound")))?;
            if resolved as usize <= at {
                return Err(compile_error(format!(
                    "backward jump from {at} to {resolved}"
                )));
            }
            if resolved as usize >= self.ops.len() {
                return Err(compile_error(format!("jump from {at} past the end")));
            }
            Ok(resolved)
        };

        let len = self.ops.len();
        let mut code = Vec::new();
        code.try_reserve_exact(len)
            .map_err(|_| RasterError::OutOfMemory {
                what: "blend unit code buffer",
                bytes: len * std::mem::size_of::<Op>(),
            })?;

        for (at, pending) in self.ops.iter().enumerate() {
            code.push(match *pending {
                PendingOp::Op(op) => op,
                PendingOp::Jump(label) => Op::Jump {
                    target: target(label, at)?,
                },
                PendingOp::Branch {
                    op,
                    lhs,
                    rhs,
                    then_label,
                    else_label,
                } => Op::Branch {
                    op,
                    lhs,
                    rhs,
                    then_target: target(then_label, at)?,
                    else_target: target(else_label, at)?,
                },
            });
        }

        if !matches!(code.last(), Some(Op::Return)) {
            return Err(compile_error("program does not end in return".into()));
        }

        Ok(Program {
            code: code.into_boxed_slice(),
            params,
            num_regs: self.max_regs,
            num_slots: self.max_slots,
        })
    }
}

fn resolve_local(frame: &Frame<'_>, index: u32) -> Result<Reg> {
    frame
        .locals
        .get(index as usize)
        .copied()
        .ok_or_else(|| compile_error(format!("{}: l{index} is not declared", frame.func.name)))
}

fn resolve_block(frame: &Frame<'_>, index: usize) -> Result<Label> {
    frame
        .blocks
        .get(index)
        .copied()
        .ok_or_else(|| compile_error(format!("{}: bb{index} does not exist", frame.func.name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::pipeline::codegen::ir::Module;

    use crate::renderer::pipeline::codegen::builder::FunctionBuilder;

    fn single_function(params: &[ParamKind], body: impl FnOnce(&mut FunctionBuilder<'_>)) -> Module {
        let mut module = Module::new();
        let mut b = module.build_function("main", params);
        body(&mut b);
        let id = b.finish().unwrap();
        module.set_entry(id);
        module
    }

    #[test]
    fn test_lowering_binds_entry_params_in_order() {
        let module = single_function(
            &[ParamKind::Vec4Ptr, ParamKind::Scalar, ParamKind::ScalarPtr],
            |b| b.ret(),
        );
        let program = lower(&module).unwrap();
        assert_eq!(
            program.params().iter().map(|(_, b)| *b).collect::<Vec<_>>(),
            vec![ParamBinding::Slot(0), ParamBinding::Reg(0), ParamBinding::Slot(1)]
        );
        assert_eq!(program.code(), &[Op::Return]);
    }

    #[test]
    fn test_scalar_pointer_rejects_lane_one() {
        let module = single_function(&[ParamKind::ScalarPtr], |b| {
            let p = b.param_array(0);
            b.store(p, 1, Value::Const(0.0));
            b.ret();
        });
        assert!(matches!(lower(&module), Err(RasterError::Compile(_))));
    }

    #[test]
    fn test_backward_jump_is_rejected() {
        let module = single_function(&[], |b| {
            let next = b.new_block();
            b.jump(next);
            b.switch_to(next);
            b.jump(crate::renderer::pipeline::codegen::ir::BlockId(0));
        });
        assert!(lower(&module).is_err());
    }

    #[test]
    fn test_recursion_is_rejected() {
        let mut module = Module::new();
        let mut b = module.build_function("f", &[]);
        b.call(FuncId(0), []);
        b.ret();
        let id = b.finish().unwrap();
        module.set_entry(id);
        assert!(lower(&module).is_err());
    }

    #[test]
    fn test_call_argument_kind_mismatch_is_rejected() {
        let mut module = Module::new();
        let mut b = module.build_function("callee", &[ParamKind::Scalar]);
        b.ret();
        let callee = b.finish().unwrap();
        let mut b = module.build_function("main", &[ParamKind::Vec4Ptr]);
        let p = b.param_array(0);
        b.call(callee, [Arg::Array(p)]);
        b.ret();
        let main = b.finish().unwrap();
        module.set_entry(main);
        assert!(lower(&module).is_err());
    }

    #[test]
    fn test_missing_entry_is_rejected() {
        assert!(lower(&Module::new()).is_err());
    }
}
