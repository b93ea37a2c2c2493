//! Shader and program object management.
//!
//! Handles shader creation and compilation, program attachment and linking,
//! and the merged uniform table that backs uniform locations.

use alloc::string::String;
use alloc::vec::Vec;
use crate::arena::ScratchArena;
use crate::compiler::{self, ast::{Qualifier, VarId}, CompiledShader};
use crate::config::ShaderBackend;
use crate::types::*;
use crate::value::ShaderType;

/// Pipeline stage of a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn from_enum(kind: GLenum) -> Option<Self> {
        match kind {
            GL_VERTEX_SHADER => Some(Self::Vertex),
            GL_FRAGMENT_SHADER => Some(Self::Fragment),
            _ => None,
        }
    }
}

/// A shader object.
pub struct GlShader {
    pub stage: Stage,
    pub source: String,
    /// Set when the source changes after the last compile.
    pub dirty: bool,
    pub compiled: Option<CompiledShader>,
}

/// A uniform merged across both stages of a program.
#[derive(Debug, Clone)]
pub struct UniformEntry {
    pub name: String,
    pub ty: ShaderType,
    /// The variable in each stage that declares it.
    pub targets: Vec<(Stage, VarId)>,
}

/// A `layout(location = N)` attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttribInfo {
    pub stage: Stage,
    pub location: u32,
    pub var: VarId,
}

/// A fragment `in` fed by the vertex `out` of the same name.
#[derive(Debug, Clone, Copy)]
pub struct Varying {
    pub vertex: VarId,
    pub fragment: VarId,
}

/// A shader program.
#[derive(Default)]
pub struct GlProgram {
    pub vertex_shader: u32,
    pub fragment_shader: u32,
    pub linked: bool,
    pub uniforms: Vec<UniformEntry>,
    pub attributes: Vec<AttribInfo>,
    pub varyings: Vec<Varying>,
}

impl GlProgram {
    /// Drop the link results. Their variable ids belong to the shader units
    /// that were attached at link time.
    pub fn unlink(&mut self) {
        self.linked = false;
        self.uniforms.clear();
        self.attributes.clear();
        self.varyings.clear();
    }
}

/// Storage for shader and program objects.
pub struct ShaderStore {
    shaders: Vec<Option<GlShader>>,
    programs: Vec<Option<GlProgram>>,
}

impl ShaderStore {
    pub fn new() -> Self {
        // Slot 0 of each table is unused (id 0 = none).
        let mut shaders = Vec::new();
        shaders.push(None);
        let mut programs = Vec::new();
        programs.push(None);
        Self { shaders, programs }
    }

    pub fn create_shader(&mut self, stage: Stage) -> u32 {
        self.shaders.push(Some(GlShader { stage, source: String::new(), dirty: true, compiled: None }));
        self.shaders.len() as u32 - 1
    }

    pub fn get_shader(&self, id: u32) -> Option<&GlShader> {
        if id == 0 { return None; }
        self.shaders.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_shader_mut(&mut self, id: u32) -> Option<&mut GlShader> {
        if id == 0 { return None; }
        self.shaders.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    /// Borrow two distinct shaders mutably at once.
    pub fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut GlShader, &mut GlShader)> {
        if a == 0 || b == 0 || a == b {
            return None;
        }
        let (lo, hi, swapped) = if a < b { (a, b, false) } else { (b, a, true) };
        let (head, tail) = self.shaders.split_at_mut(hi as usize);
        let first = head.get_mut(lo as usize)?.as_mut()?;
        let second = tail.first_mut()?.as_mut()?;
        Some(if swapped { (second, first) } else { (first, second) })
    }

    pub fn create_program(&mut self) -> u32 {
        self.programs.push(Some(GlProgram::default()));
        self.programs.len() as u32 - 1
    }

    pub fn get_program(&self, id: u32) -> Option<&GlProgram> {
        if id == 0 { return None; }
        self.programs.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn get_program_mut(&mut self, id: u32) -> Option<&mut GlProgram> {
        if id == 0 { return None; }
        self.programs.get_mut(id as usize).and_then(|s| s.as_mut())
    }

    /// Compile a shader from its source. Returns whether code was regenerated.
    pub fn compile_shader(&mut self, id: u32, backend: ShaderBackend, arena: &mut ScratchArena) -> Option<bool> {
        let shader = self.get_shader_mut(id)?;
        if !shader.dirty && shader.compiled.is_some() {
            return Some(false);
        }
        shader.compiled = Some(compiler::compile(&shader.source, backend, arena));
        shader.dirty = false;
        Some(true)
    }

    /// Mark every program using shader `id` as unlinked. Its variable ids are
    /// stale after a recompile.
    pub fn unlink_users(&mut self, id: u32) {
        for prog in self.programs.iter_mut().flatten() {
            if prog.linked && (prog.vertex_shader == id || prog.fragment_shader == id) {
                prog.unlink();
                log::debug!("shader {} recompiled; program needs relinking", id);
            }
        }
    }

    /// Link a program from its attached shaders.
    ///
    /// Leaves the program unlinked if either stage is missing or not compiled.
    pub fn link_program(&mut self, program_id: u32) -> Option<()> {
        let prog = self.get_program(program_id)?;
        if prog.linked {
            return Some(());
        }
        let (vs_id, fs_id) = (prog.vertex_shader, prog.fragment_shader);

        let vs = self.get_shader(vs_id).and_then(|s| s.compiled.as_ref());
        let fs = self.get_shader(fs_id).and_then(|s| s.compiled.as_ref());
        let (Some(vs), Some(fs)) = (vs, fs) else {
            log::warn!("link: program {} has a missing or uncompiled stage", program_id);
            return Some(());
        };
        let (vs, fs) = (&vs.unit, &fs.unit);

        let mut varyings = Vec::new();
        for fragment in fs.globals_where(|q| q == Qualifier::In) {
            let name = &fs.var(fragment).name;
            let vertex = vs.globals_where(|q| q == Qualifier::Out).find(|&v| vs.var(v).name == *name);
            if let Some(vertex) = vertex {
                varyings.push(Varying { vertex, fragment });
            }
        }

        let mut uniforms: Vec<UniformEntry> = Vec::new();
        let mut attributes = Vec::new();
        for (stage, unit) in [(Stage::Vertex, vs), (Stage::Fragment, fs)] {
            for id in unit.globals.iter().copied() {
                let var = unit.var(id);
                match var.qualifier {
                    Qualifier::Uniform => match uniforms.iter_mut().find(|u| u.name == var.name) {
                        Some(entry) => entry.targets.push((stage, id)),
                        None => uniforms.push(UniformEntry {
                            name: var.name.clone(),
                            ty: var.ty,
                            targets: alloc::vec![(stage, id)],
                        }),
                    },
                    Qualifier::Layout(location) => attributes.push(AttribInfo { stage, location, var: id }),
                    _ => {}
                }
            }
        }

        log::info!(
            "link: program {} ({} varyings, {} uniforms, {} attributes)",
            program_id,
            varyings.len(),
            uniforms.len(),
            attributes.len()
        );
        let prog = self.get_program_mut(program_id)?;
        prog.varyings = varyings;
        prog.uniforms = uniforms;
        prog.attributes = attributes;
        prog.linked = true;
        Some(())
    }
}

/// Uniform location for entry `index` of program `program_id`.
pub fn uniform_location(program_id: u32, index: usize) -> i32 {
    (((program_id - 1) << 16) | index as u32) as i32
}

/// Split a uniform location into `(program_id, index)`.
pub fn split_location(location: i32) -> (u32, usize) {
    let raw = location as u32;
    ((raw >> 16) + 1, (raw & 0xFFFF) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn compiled_pair(vs: &str, fs: &str) -> (ShaderStore, u32) {
        let mut store = ShaderStore::new();
        let mut arena = ScratchArena::new();
        let v = store.create_shader(Stage::Vertex);
        let f = store.create_shader(Stage::Fragment);
        store.get_shader_mut(v).expect("vs").source = vs.into();
        store.get_shader_mut(f).expect("fs").source = fs.into();
        store.compile_shader(v, ShaderBackend::Interpreter, &mut arena);
        store.compile_shader(f, ShaderBackend::Interpreter, &mut arena);
        let p = store.create_program();
        let prog = store.get_program_mut(p).expect("program");
        prog.vertex_shader = v;
        prog.fragment_shader = f;
        (store, p)
    }

    #[test]
    fn link_matches_varyings_and_merges_uniforms() {
        let (mut store, p) = compiled_pair(
            "layout(location = 0) in vec4 pos; uniform float t; out vec2 uv; out vec3 unused; void main() { gl_Position = pos; }",
            "in vec2 uv; in float missing; uniform float t; uniform sampler2D tex; out vec4 color; void main() { color = texture(tex, uv); }",
        );
        store.link_program(p);
        let prog = store.get_program(p).expect("program");
        assert!(prog.linked);
        assert_eq!(prog.varyings.len(), 1);
        assert_eq!(prog.uniforms.len(), 2);
        assert_eq!(prog.uniforms[0].name, "t");
        assert_eq!(prog.uniforms[0].targets.len(), 2);
        assert_eq!(prog.attributes.len(), 1);
        assert_eq!(prog.attributes[0].location, 0);
    }

    #[test]
    fn link_requires_both_stages() {
        let mut store = ShaderStore::new();
        let p = store.create_program();
        store.link_program(p);
        assert!(!store.get_program(p).expect("program").linked);
        assert!(store.link_program(99).is_none());
    }

    #[test]
    fn compile_is_idempotent() {
        let mut store = ShaderStore::new();
        let mut arena = ScratchArena::new();
        let s = store.create_shader(Stage::Vertex);
        assert_eq!(store.compile_shader(s, ShaderBackend::MicroOp, &mut arena), Some(true));
        assert_eq!(store.compile_shader(s, ShaderBackend::MicroOp, &mut arena), Some(false));
        assert_eq!(store.compile_shader(42, ShaderBackend::MicroOp, &mut arena), None);
    }

    #[test]
    fn recompile_unlinks_users() {
        let (mut store, p) = compiled_pair(
            "void main() { gl_Position = vec4(0.0, 0.0, 0.0, 1.0); }",
            "out vec4 color; void main() { color = vec4(1.0, 1.0, 1.0, 1.0); }",
        );
        store.link_program(p);
        let vs = store.get_program(p).expect("program").vertex_shader;
        store.unlink_users(vs);
        assert!(!store.get_program(p).expect("program").linked);
    }

    #[test]
    fn pair_mut_orders_results() {
        let mut store = ShaderStore::new();
        let a = store.create_shader(Stage::Vertex);
        let b = store.create_shader(Stage::Fragment);
        let (x, y) = store.pair_mut(b, a).expect("pair");
        assert_eq!((x.stage, y.stage), (Stage::Fragment, Stage::Vertex));
        assert!(store.pair_mut(a, a).is_none());
    }

    #[test]
    fn locations_round_trip() {
        assert_eq!(uniform_location(1, 3), 3);
        assert_eq!(uniform_location(3, 1), 0x20001);
        assert_eq!(split_location(0x20001), (3, 1));
    }
}
