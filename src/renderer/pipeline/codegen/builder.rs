//! Incremental function construction.
//!
//! [`FunctionBuilder`] appends statements to a *current* block and closes
//! blocks with terminators, in the spirit of a JIT context API: create
//! blocks up front, switch between them, and emit control flow explicitly.

use smallvec::SmallVec;

use super::ir::{
    Arg, Array, Block, BlockId, CmpOp, FuncId, Function, LocalId, Module, ParamKind, Place, Stmt,
    Terminator, Value,
};
use crate::errors::{RasterError, Result};

/// Maximum number of function-local arrays.
pub const MAX_LOCAL_ARRAYS: u8 = 8;

/// Builds one [`Function`] and registers it in its [`Module`] on [`finish`].
///
/// [`finish`]: FunctionBuilder::finish
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: Function,
    current: BlockId,
    malformed: Option<String>,
}

impl Module {
    /// Starts a new function with one empty entry block.
    pub fn build_function(
        &mut self,
        name: impl Into<String>,
        params: &[ParamKind],
    ) -> FunctionBuilder<'_> {
        FunctionBuilder {
            module: self,
            func: Function {
                name: name.into(),
                params: params.to_vec(),
                num_locals: 0,
                num_arrays: 0,
                blocks: vec![Block::default()],
            },
            current: BlockId(0),
            malformed: None,
        }
    }
}

impl FunctionBuilder<'_> {
    // ── Operands ─────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn param_array(&self, index: u8) -> Array {
        Array::Param(index)
    }

    #[inline]
    #[must_use]
    pub fn param(&self, index: u8) -> Value {
        Value::Param(index)
    }

    pub fn new_local(&mut self) -> LocalId {
        let id = LocalId(self.func.num_locals);
        self.func.num_locals += 1;
        id
    }

    pub fn new_array(&mut self) -> Array {
        if self.func.num_arrays >= MAX_LOCAL_ARRAYS {
            self.fail(format!(
                "{}: more than {MAX_LOCAL_ARRAYS} local arrays",
                self.func.name
            ));
        }
        let id = self.func.num_arrays;
        self.func.num_arrays = self.func.num_arrays.saturating_add(1);
        Array::Local(id)
    }

    // ── Blocks ───────────────────────────────────────────────────────────────

    pub fn new_block(&mut self) -> BlockId {
        self.func.blocks.push(Block::default());
        BlockId(self.func.blocks.len() as u32 - 1)
    }

    #[inline]
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    #[inline]
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    // ── Statements ───────────────────────────────────────────────────────────

    pub fn assign(&mut self, dst: Place, value: Value) {
        self.push(Stmt::Assign { dst, value });
    }

    pub fn store(&mut self, array: Array, lane: u8, value: Value) {
        self.assign(Place::Lane { array, lane }, value);
    }

    pub fn call(&mut self, func: FuncId, args: impl IntoIterator<Item = Arg>) {
        let args: SmallVec<[Arg; 5]> = args.into_iter().collect();
        self.push(Stmt::Call { func, args });
    }

    // ── Terminators ──────────────────────────────────────────────────────────

    pub fn ret(&mut self) {
        self.terminate(Terminator::Return);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    pub fn branch(
        &mut self,
        op: CmpOp,
        lhs: Value,
        rhs: Value,
        then_block: BlockId,
        else_block: BlockId,
    ) {
        self.terminate(Terminator::Branch {
            op,
            lhs,
            rhs,
            then_block,
            else_block,
        });
    }

    /// Registers the function in the module.
    ///
    /// Fails if a statement was appended to a closed block, a block was
    /// closed twice, or a block was left open.
    pub fn finish(self) -> Result<FuncId> {
        if let Some(reason) = self.malformed {
            return Err(RasterError::Compile(reason));
        }
        if let Some(open) = self.func.blocks.iter().position(|b| b.terminator.is_none()) {
            return Err(RasterError::Compile(format!(
                "{}: block bb{open} has no terminator",
                self.func.name
            )));
        }
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(self.func);
        Ok(id)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn push(&mut self, stmt: Stmt) {
        let index = self.current.index();
        match self.func.blocks.get(index).map(|b| b.terminator.is_some()) {
            Some(false) => self.func.blocks[index].stmts.push(stmt),
            Some(true) => self.fail(format!(
                "{}: statement after terminator in bb{index}",
                self.func.name
            )),
            None => self.fail(format!("{}: unknown block bb{index}", self.func.name)),
        }
    }

    fn terminate(&mut self, terminator: Terminator) {
        let index = self.current.index();
        match self.func.blocks.get(index).map(|b| b.terminator.is_some()) {
            Some(false) => self.func.blocks[index].terminator = Some(terminator),
            Some(true) => self.fail(format!("{}: bb{index} terminated twice", self.func.name)),
            None => self.fail(format!("{}: unknown block bb{index}", self.func.name)),
        }
    }

    fn fail(&mut self, reason: String) {
        self.malformed.get_or_insert(reason);
    }
}
