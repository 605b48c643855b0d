//! Blend Unit Code Generation
//!
//! Builds a specialized program for one [`PipelineState`] and compiles it
//! into a [`CompiledUnit`]:
//!
//! ```text
//! PipelineState ──▶ BlendEmitter ──▶ ir::Module ──▶ compile::lower ──▶ Program ──▶ CompiledUnit
//!                    (helpers +        (blocks,       (inline, alloc,
//!                     fragment_set)     branches)      resolve labels)
//! ```
//!
//! The generator keeps no per-state data; everything it produces is owned by
//! the returned unit.

pub mod blend;
pub mod builder;
pub mod compile;
pub mod ir;

use crate::errors::Result;
use crate::renderer::pipeline::fingerprint::StateFingerprint;
use crate::renderer::pipeline::unit::CompiledUnit;
use crate::renderer::state::PipelineState;

use self::blend::BlendEmitter;
use self::ir::Module;

/// Produces executable units for pipeline states.
///
/// The specialization cache is generic over this trait so alternative back
/// ends can be plugged in.
pub trait UnitCompiler {
    fn compile(&mut self, state: &PipelineState) -> Result<CompiledUnit>;
}

/// The default IR-based unit compiler.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    /// Log a listing of every generated module at `trace` level.
    pub trace_listing: bool,
    compiled: u64,
}

impl CodeGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_trace_listing(mut self, enabled: bool) -> Self {
        self.trace_listing = enabled;
        self
    }

    /// Number of units compiled so far.
    #[inline]
    #[must_use]
    pub fn compiled_count(&self) -> u64 {
        self.compiled
    }

    /// Builds the IR module for `state` without lowering it.
    pub fn generate(&self, state: &PipelineState) -> Result<Module> {
        let mut module = Module::new();
        BlendEmitter::new(&mut module).emit(state)?;
        Ok(module)
    }
}

impl UnitCompiler for CodeGenerator {
    fn compile(&mut self, state: &PipelineState) -> Result<CompiledUnit> {
        let fingerprint = state.fingerprint();
        let module = self.generate(state)?;
        if self.trace_listing {
            log::trace!("blend program {fingerprint:#010x}:\n{module}");
        }
        let program = compile::lower(&module)?;
        let unit = CompiledUnit::new(program, *state, fingerprint)?;
        self.compiled += 1;
        log::debug!(
            "Compiled blend unit {fingerprint:#010x}: {} ops, {} branches",
            unit.program().code().len(),
            unit.program().branch_count()
        );
        Ok(unit)
    }
}
