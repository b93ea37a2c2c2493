//! Shader compiler.
//!
//! Pipeline: Source → [`lexer`] → Tokens → [`parser`] → AST → [`lower`] → IR.
//! The AST is run directly by [`eval`]; the IR is run by [`backend_sw`] or
//! translated to x86_64 code by [`backend_jit`] and installed into an
//! [`executable::ExecRegion`].

pub mod lexer;
pub mod ast;
pub mod parser;
pub mod eval;
pub mod ir;
pub mod lower;
pub mod backend_sw;
pub mod backend_jit;
pub mod executable;

use alloc::vec::Vec;
use crate::arena::ScratchArena;
use crate::config::ShaderBackend;
use crate::texture::SamplerView;
use crate::value::Value;
use ast::ShaderUnit;
use backend_jit::JitFn;

/// Front-end output plus generated code for one shader stage.
pub struct CompiledShader {
    pub unit: ShaderUnit,
    /// Micro-ops; empty for the interpreter backend.
    pub code: Vec<Inst>,
    /// x86_64 code for `code`; empty unless the backend is `Jit`.
    pub native: Vec<u8>,
}

pub use ir::Inst;

/// How to run a stage for one invocation.
#[derive(Clone, Copy)]
pub enum Exec {
    Interpret,
    MicroOp,
    Native(JitFn),
}

/// Compile shader source for `backend`.
pub fn compile(source: &str, backend: ShaderBackend, arena: &mut ScratchArena) -> CompiledShader {
    let mut unit = parser::parse(source);
    let (code, native) = match backend {
        ShaderBackend::Interpreter => (Vec::new(), Vec::new()),
        ShaderBackend::MicroOp => (lower::lower(&mut unit, arena), Vec::new()),
        ShaderBackend::Jit => {
            let code = lower::lower(&mut unit, arena);
            let native = backend_jit::compile(&code);
            (code, native)
        }
    };
    log::debug!(
        "compiled shader: {} statements ({} null), {} globals, {} micro-ops, {} code bytes",
        unit.body.len(),
        unit.body.iter().filter(|s| s.is_none()).count(),
        unit.globals.len(),
        code.len(),
        native.len()
    );
    CompiledShader { unit, code, native }
}

impl CompiledShader {
    /// Run one invocation. Globals flow in from and back out to their
    /// variable buffers around the compiled paths.
    pub fn execute(&mut self, exec: Exec, arena: &mut ScratchArena, samplers: &SamplerView) {
        match exec {
            Exec::Interpret => eval::run(&mut self.unit, samplers),
            Exec::MicroOp => {
                self.store_globals(arena);
                backend_sw::execute(&self.code, arena.as_mut_slice(), samplers);
                self.load_globals(arena);
            }
            Exec::Native(entry) => {
                self.store_globals(arena);
                // SAFETY: `entry` is this shader's code, installed by the
                // context, and every slot it touches was allocated in `arena`.
                unsafe { backend_jit::invoke(entry, arena.as_mut_slice(), samplers) };
                self.load_globals(arena);
            }
        }
    }

    fn store_globals(&self, arena: &mut ScratchArena) {
        for &id in &self.unit.globals {
            let var = self.unit.var(id);
            if let (Some(slot), Some(value)) = (var.slot, var.value) {
                value.write_slots(arena.rows_mut(slot, var.ty.rows()));
            }
        }
    }

    fn load_globals(&mut self, arena: &ScratchArena) {
        let ShaderUnit { vars, globals, .. } = &mut self.unit;
        for &id in globals.iter() {
            let var = &mut vars[id.index()];
            if let Some(slot) = var.slot {
                var.value = Some(Value::read_slots(var.ty, arena.rows(slot, var.ty.rows())));
            }
        }
    }
}
