//! Blend program IR.
//!
//! A deliberately small, block-structured intermediate representation:
//!
//! ```text
//! Module ─┬─ Function "fragment_set" (entry)
//!         │    params: vec4*, float*, vec4*, float, vec4*
//!         │    Block 0: stmts…  → Branch / Jump / Return
//!         │    Block 1: …
//!         └─ Function "rgb_src_alpha" …
//! ```
//!
//! Values are expression trees over `f32`. Memory is a set of 4-lane float
//! arrays, either pointer parameters or function-local temporaries. Control
//! flow is explicit: every block ends in exactly one [`Terminator`], and
//! conditionals are expressed as [`Terminator::Branch`] rather than as
//! select-style value operators, so the lowered program evaluates exactly the
//! comparisons the generator wrote.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use smallvec::SmallVec;

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Index of a function inside a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a block inside its [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar local variable of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub(crate) u32);

// ─── Types ───────────────────────────────────────────────────────────────────

/// Parameter types understood by the lowering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Pointer to four floats.
    Vec4Ptr,
    /// Pointer to one float; only lane 0 is addressable.
    ScalarPtr,
    /// Float passed by value.
    Scalar,
}

impl ParamKind {
    #[must_use]
    pub fn lanes(self) -> u8 {
        match self {
            Self::Vec4Ptr => 4,
            Self::ScalarPtr => 1,
            Self::Scalar => 0,
        }
    }
}

/// Addressable float array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Array {
    /// Pointer parameter, by parameter index.
    Param(u8),
    /// Function-local `float[4]`.
    Local(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
}

impl BinOp {
    #[inline]
    #[must_use]
    pub fn eval(self, lhs: f32, rhs: f32) -> f32 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
        }
    }
}

/// Ordered comparison used by conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Le,
    Ge,
}

impl CmpOp {
    #[inline]
    #[must_use]
    pub fn eval(self, lhs: f32, rhs: f32) -> bool {
        match self {
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

// ─── Expressions & Statements ────────────────────────────────────────────────

/// Scalar expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Const(f32),
    Load { array: Array, lane: u8 },
    /// By-value scalar parameter.
    Param(u8),
    Local(LocalId),
    Binary {
        op: BinOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },
}

impl Value {
    #[inline]
    #[must_use]
    pub fn load(array: Array, lane: u8) -> Self {
        Self::Load { array, lane }
    }

    #[must_use]
    pub fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Self) -> Self::Output {
        Value::binary(BinOp::Add, self, rhs)
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Self) -> Self::Output {
        Value::binary(BinOp::Sub, self, rhs)
    }
}

impl Mul for Value {
    type Output = Value;

    fn mul(self, rhs: Self) -> Self::Output {
        Value::binary(BinOp::Mul, self, rhs)
    }
}

/// Assignment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    Lane { array: Array, lane: u8 },
    Local(LocalId),
}

/// Call argument; must match the callee's [`ParamKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Array(Array),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { dst: Place, value: Value },
    Call {
        func: FuncId,
        args: SmallVec<[Arg; 5]>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Return,
    Jump(BlockId),
    Branch {
        op: CmpOp,
        lhs: Value,
        rhs: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    /// `None` only while the block is under construction.
    pub terminator: Option<Terminator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<ParamKind>,
    pub num_locals: u32,
    pub num_arrays: u8,
    pub blocks: Vec<Block>,
}

/// A set of functions with one designated entry point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub functions: Vec<Function>,
    pub entry: Option<FuncId>,
}

impl Module {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn set_entry(&mut self, id: FuncId) {
        self.entry = Some(id);
    }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(i) => write!(f, "p{i}"),
            Self::Local(i) => write!(f, "tmp{i}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{v:?}"),
            Self::Load { array, lane } => write!(f, "{array}[{lane}]"),
            Self::Param(i) => write!(f, "p{i}"),
            Self::Local(l) => write!(f, "l{}", l.0),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lane { array, lane } => write!(f, "{array}[{lane}]"),
            Self::Local(l) => write!(f, "l{}", l.0),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (fi, func) in self.functions.iter().enumerate() {
            let entry = if self.entry == Some(FuncId(fi as u32)) { " (entry)" } else { "" };
            writeln!(f, "fn {}{entry}({:?}) {{", func.name, func.params)?;
            for (bi, block) in func.blocks.iter().enumerate() {
                writeln!(f, "  bb{bi}:")?;
                for stmt in &block.stmts {
                    match stmt {
                        Stmt::Assign { dst, value } => writeln!(f, "    {dst} = {value};")?,
                        Stmt::Call { func: callee, args } => {
                            let name = self
                                .function(*callee)
                                .map_or("<unknown>", |c| c.name.as_str());
                            write!(f, "    {name}(")?;
                            for (ai, arg) in args.iter().enumerate() {
                                if ai > 0 {
                                    write!(f, ", ")?;
                                }
                                match arg {
                                    Arg::Array(a) => write!(f, "{a}")?,
                                    Arg::Value(v) => write!(f, "{v}")?,
                                }
                            }
                            writeln!(f, ");")?;
                        }
                    }
                }
                match &block.terminator {
                    Some(Terminator::Return) => writeln!(f, "    return;")?,
                    Some(Terminator::Jump(b)) => writeln!(f, "    goto bb{};", b.0)?,
                    Some(Terminator::Branch {
                        op,
                        lhs,
                        rhs,
                        then_block,
                        else_block,
                    }) => writeln!(
                        f,
                        "    if {lhs} {} {rhs} goto bb{} else goto bb{};",
                        op.symbol(),
                        then_block.0,
                        else_block.0
                    )?,
                    None => writeln!(f, "    <unterminated>")?,
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
