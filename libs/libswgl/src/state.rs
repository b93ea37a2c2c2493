//! GL context state machine.
//!
//! `GlContext` holds all mutable state of one renderer: viewport, clear color,
//! bound objects, the object stores, the framebuffer and the JIT execution
//! region. Every entry point takes effect immediately; nothing is batched.

use alloc::vec::Vec;
use crate::arena::ScratchArena;
use crate::buffer::{BufferStore, VertexArrayStore, VertexAttrib};
use crate::compiler::backend_jit::JitFn;
use crate::compiler::executable::ExecRegion;
use crate::compiler::Exec;
use crate::config::{ContextConfig, ShaderBackend};
use crate::error::{GlError, GlResult};
use crate::framebuffer::SwFramebuffer;
use crate::rasterizer::{self, DrawCall};
use crate::shader::{self, ShaderStore, Stage};
use crate::texture::{SamplerView, TextureStore, MAX_TEXTURE_UNITS};
use crate::types::*;
use crate::value::{ShaderType, Value};

/// Whether this target can run generated x86_64 code.
const JIT_SUPPORTED: bool = cfg!(all(target_arch = "x86_64", unix));

/// Complete GL context state.
pub struct GlContext {
    backend: ShaderBackend,

    // ── Viewport & Clear ────────────────────────────────────────────────
    /// `[x, y, width, height]`.
    pub viewport: [i32; 4],
    pub clear_rgba: [f32; 4],

    // ── Bound Objects ───────────────────────────────────────────────────
    pub bound_array_buffer: u32,
    pub bound_vertex_array: u32,
    pub active_texture_unit: u32,
    pub bound_textures: [u32; MAX_TEXTURE_UNITS],
    pub current_program: u32,

    // ── Object Stores ───────────────────────────────────────────────────
    pub buffers: BufferStore,
    pub vertex_arrays: VertexArrayStore,
    pub textures: TextureStore,
    pub shaders: ShaderStore,

    /// Slots for every compiled shader's variables and temporaries.
    pub arena: ScratchArena,
    pub framebuffer: SwFramebuffer,
    exec: Option<ExecRegion>,
}

impl GlContext {
    /// Create a context with a cleared framebuffer of the configured size.
    ///
    /// A `Jit` backend degrades to `MicroOp` when native code cannot run here.
    pub fn new(config: ContextConfig) -> Self {
        let mut backend = config.backend;
        let mut exec = None;
        if backend == ShaderBackend::Jit {
            if !JIT_SUPPORTED {
                log::warn!("JIT unsupported on this target; falling back to micro-op execution");
                backend = ShaderBackend::MicroOp;
            } else {
                match ExecRegion::new(config.exec_region_bytes) {
                    Ok(region) => exec = Some(region),
                    Err(e) => {
                        log::warn!("{}; falling back to micro-op execution", e);
                        backend = ShaderBackend::MicroOp;
                    }
                }
            }
        }

        log::info!(
            "context: {}x{} {:?}, {:?} shaders",
            config.width,
            config.height,
            config.color_format,
            backend
        );
        Self {
            backend,
            viewport: [0, 0, config.width as i32, config.height as i32],
            clear_rgba: [0.0; 4],
            bound_array_buffer: 0,
            bound_vertex_array: 0,
            active_texture_unit: 0,
            bound_textures: [0; MAX_TEXTURE_UNITS],
            current_program: 0,
            buffers: BufferStore::new(),
            vertex_arrays: VertexArrayStore::new(),
            textures: TextureStore::new(),
            shaders: ShaderStore::new(),
            arena: ScratchArena::new(),
            framebuffer: SwFramebuffer::new(config.width, config.height, config.color_format),
            exec,
        }
    }

    /// The backend shaders are actually compiled for.
    pub fn backend(&self) -> ShaderBackend {
        self.backend
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Shaders & Programs
    // ══════════════════════════════════════════════════════════════════════

    pub fn create_shader(&mut self, kind: GLenum) -> GlResult<u32> {
        let stage = Stage::from_enum(kind).ok_or(GlError::InvalidEnum(kind))?;
        Ok(self.shaders.create_shader(stage))
    }

    /// Replace a shader's source. Takes effect at the next compile.
    pub fn shader_source(&mut self, shader: u32, source: &str) -> GlResult<()> {
        let s = self.shaders.get_shader_mut(shader).ok_or(GlError::InvalidShader(shader))?;
        if s.source != source {
            s.source.clear();
            s.source.push_str(source);
            s.dirty = true;
        }
        Ok(())
    }

    /// Compile a shader. Recompiling unchanged source does nothing.
    pub fn compile_shader(&mut self, shader: u32) -> GlResult<()> {
        let regenerated = self
            .shaders
            .compile_shader(shader, self.backend, &mut self.arena)
            .ok_or(GlError::InvalidShader(shader))?;
        if regenerated {
            self.shaders.unlink_users(shader);
            if let Some(region) = self.exec.as_mut() {
                region.invalidate();
            }
        }
        Ok(())
    }

    /// Shader objects live as long as the context; deleting one is a no-op.
    pub fn delete_shader(&mut self, shader: u32) -> GlResult<()> {
        self.shaders.get_shader(shader).map(|_| ()).ok_or(GlError::InvalidShader(shader))
    }

    pub fn create_program(&mut self) -> u32 {
        self.shaders.create_program()
    }

    /// Attach a shader to the program slot of its stage.
    ///
    /// Replacing the shader of a linked program unlinks it; it draws nothing
    /// until the next `link_program`.
    pub fn attach_shader(&mut self, program: u32, shader: u32) -> GlResult<()> {
        let stage = self.shaders.get_shader(shader).ok_or(GlError::InvalidShader(shader))?.stage;
        let prog = self.shaders.get_program_mut(program).ok_or(GlError::InvalidProgram(program))?;
        let slot = match stage {
            Stage::Vertex => &mut prog.vertex_shader,
            Stage::Fragment => &mut prog.fragment_shader,
        };
        if core::mem::replace(slot, shader) == shader || !prog.linked {
            return Ok(());
        }
        prog.unlink();
        log::debug!("program {}: {:?} stage replaced; program needs relinking", program, stage);
        if let Some(region) = self.exec.as_mut().filter(|r| r.installed() == Some(program)) {
            region.invalidate();
        }
        Ok(())
    }

    pub fn link_program(&mut self, program: u32) -> GlResult<()> {
        self.shaders.link_program(program).ok_or(GlError::InvalidProgram(program))
    }

    /// Make `program` current. 0 unbinds. Under the JIT its code is copied
    /// into the execution region, replacing whatever was there.
    pub fn use_program(&mut self, program: u32) -> GlResult<()> {
        if program != 0 && self.shaders.get_program(program).is_none() {
            return Err(GlError::InvalidProgram(program));
        }
        self.current_program = program;
        if program != 0 {
            if let Err(e) = self.install_program(program) {
                log::warn!("program {}: {}", program, e);
            }
        }
        Ok(())
    }

    /// Copy a linked program's native code into the execution region if it
    /// is not already there.
    fn install_program(&mut self, program: u32) -> GlResult<()> {
        let Some(region) = self.exec.as_mut() else { return Ok(()) };
        if region.installed() == Some(program) {
            return Ok(());
        }
        let Some(prog) = self.shaders.get_program(program).filter(|p| p.linked) else { return Ok(()) };
        let code = |id: u32| self.shaders.get_shader(id).and_then(|s| s.compiled.as_ref()).map(|c| c.native.as_slice());
        match (code(prog.vertex_shader), code(prog.fragment_shader)) {
            (Some(vs), Some(fs)) => region.install(program, vs, fs),
            _ => Err(GlError::InvalidProgram(program)),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Uniforms
    // ══════════════════════════════════════════════════════════════════════

    /// Location of uniform `name`, or -1 if the linked program has none.
    pub fn get_uniform_location(&self, program: u32, name: &str) -> GlResult<i32> {
        let prog = self.shaders.get_program(program).ok_or(GlError::InvalidProgram(program))?;
        Ok(prog
            .uniforms
            .iter()
            .position(|u| u.name == name)
            .map_or(-1, |i| shader::uniform_location(program, i)))
    }

    /// Store `value` into every stage variable behind `location`.
    ///
    /// -1 is ignored. A value whose type the uniform cannot hold is dropped.
    fn set_uniform(&mut self, location: i32, value: Value) -> GlResult<()> {
        if location == -1 {
            return Ok(());
        }
        let (program, index) = shader::split_location(location);
        let prog = self.shaders.get_program(program).ok_or(GlError::InvalidProgram(program))?;
        if !prog.linked {
            log::debug!("uniform {:#x}: program {} is not linked", location, program);
            return Ok(());
        }
        let entry = prog.uniforms.get(index).ok_or(GlError::InvalidUniformLocation(location))?;
        let targets: Vec<(u32, _)> = entry
            .targets
            .iter()
            .map(|&(stage, var)| match stage {
                Stage::Vertex => (prog.vertex_shader, var),
                Stage::Fragment => (prog.fragment_shader, var),
            })
            .collect();

        for (shader, var) in targets {
            let Some(compiled) = self.shaders.get_shader_mut(shader).and_then(|s| s.compiled.as_mut()) else { continue };
            let Some(var) = compiled.unit.vars.get_mut(var.index()) else { continue };
            if !var.write(value) {
                log::debug!("uniform {}: {:?} value does not fit a {:?}", var.name, value.ty(), var.ty);
            }
        }
        Ok(())
    }

    pub fn uniform1f(&mut self, location: i32, x: f32) -> GlResult<()> {
        self.set_uniform(location, Value::Float(x))
    }

    pub fn uniform2f(&mut self, location: i32, x: f32, y: f32) -> GlResult<()> {
        self.set_uniform(location, Value::Vec2([x, y]))
    }

    pub fn uniform3f(&mut self, location: i32, x: f32, y: f32, z: f32) -> GlResult<()> {
        self.set_uniform(location, Value::Vec3([x, y, z]))
    }

    pub fn uniform4f(&mut self, location: i32, x: f32, y: f32, z: f32, w: f32) -> GlResult<()> {
        self.set_uniform(location, Value::Vec4([x, y, z, w]))
    }

    /// Set an int uniform. Also selects the texture unit of a sampler.
    pub fn uniform1i(&mut self, location: i32, x: i32) -> GlResult<()> {
        self.set_uniform(location, Value::Int(x))
    }

    pub fn uniform_matrix2fv(&mut self, location: i32, transpose: bool, values: &[f32]) -> GlResult<()> {
        let m = matrix_rows(values, 2, transpose)?;
        self.set_uniform(location, Value::from_rows(ShaderType::Mat2, m))
    }

    pub fn uniform_matrix3fv(&mut self, location: i32, transpose: bool, values: &[f32]) -> GlResult<()> {
        let m = matrix_rows(values, 3, transpose)?;
        self.set_uniform(location, Value::from_rows(ShaderType::Mat3, m))
    }

    pub fn uniform_matrix4fv(&mut self, location: i32, transpose: bool, values: &[f32]) -> GlResult<()> {
        let m = matrix_rows(values, 4, transpose)?;
        self.set_uniform(location, Value::from_rows(ShaderType::Mat4, m))
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Buffers & Vertex Arrays
    // ══════════════════════════════════════════════════════════════════════

    pub fn gen_buffer(&mut self) -> u32 {
        self.buffers.gen()
    }

    /// Bind a vertex buffer. The current vertex array records it too.
    pub fn bind_buffer(&mut self, target: GLenum, buffer: u32) -> GlResult<()> {
        if target != GL_ARRAY_BUFFER {
            return Err(GlError::InvalidEnum(target));
        }
        if buffer != 0 && self.buffers.get(buffer).is_none() {
            return Err(GlError::InvalidBuffer(buffer));
        }
        self.bound_array_buffer = buffer;
        if let Some(vao) = self.vertex_arrays.get_mut(self.bound_vertex_array) {
            vao.buffer = buffer;
        }
        Ok(())
    }

    /// Fill the bound buffer. A buffer only accepts its first upload.
    pub fn buffer_data(&mut self, target: GLenum, data: &[u8], usage: GLenum) -> GlResult<()> {
        if target != GL_ARRAY_BUFFER {
            return Err(GlError::InvalidEnum(target));
        }
        let id = self.bound_array_buffer;
        let Some(buf) = self.buffers.get_mut(id) else {
            log::debug!("buffer_data with no buffer bound");
            return Ok(());
        };
        if !buf.upload(data, usage) {
            log::warn!("buffer {}: already filled, upload ignored", id);
        }
        Ok(())
    }

    pub fn gen_vertex_array(&mut self) -> u32 {
        self.vertex_arrays.gen()
    }

    pub fn bind_vertex_array(&mut self, array: u32) -> GlResult<()> {
        if array != 0 && self.vertex_arrays.get(array).is_none() {
            return Err(GlError::InvalidVertexArray(array));
        }
        self.bound_vertex_array = array;
        Ok(())
    }

    /// Describe attribute `index` of the bound vertex array.
    pub fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        typ: GLenum,
        normalized: bool,
        stride: u32,
        offset: usize,
    ) -> GlResult<()> {
        if !(1..=4).contains(&size) {
            return Err(GlError::InvalidValue("attribute size must be 1 to 4"));
        }
        if !matches!(typ, GL_FLOAT | GL_BYTE | GL_UNSIGNED_BYTE | GL_SHORT | GL_UNSIGNED_SHORT) {
            return Err(GlError::InvalidEnum(typ));
        }
        let Some(vao) = self.vertex_arrays.get_mut(self.bound_vertex_array) else {
            log::debug!("vertex_attrib_pointer with no vertex array bound");
            return Ok(());
        };
        vao.set_attrib(VertexAttrib { index, size, typ, normalized, stride, offset });
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Textures
    // ══════════════════════════════════════════════════════════════════════

    pub fn gen_texture(&mut self) -> u32 {
        self.textures.gen()
    }

    /// Select the unit later texture calls act on.
    pub fn active_texture(&mut self, texture: GLenum) -> GlResult<()> {
        let unit = texture.wrapping_sub(GL_TEXTURE0);
        if unit as usize >= MAX_TEXTURE_UNITS {
            return Err(GlError::InvalidEnum(texture));
        }
        self.active_texture_unit = unit;
        Ok(())
    }

    pub fn bind_texture(&mut self, target: GLenum, texture: u32) -> GlResult<()> {
        if target != GL_TEXTURE_2D {
            return Err(GlError::InvalidEnum(target));
        }
        if texture != 0 && self.textures.get(texture).is_none() {
            return Err(GlError::InvalidTexture(texture));
        }
        self.bound_textures[self.active_texture_unit as usize] = texture;
        Ok(())
    }

    fn bound_texture_mut(&mut self, target: GLenum) -> GlResult<Option<&mut crate::texture::GlTexture>> {
        if target != GL_TEXTURE_2D {
            return Err(GlError::InvalidEnum(target));
        }
        let id = self.bound_textures[self.active_texture_unit as usize];
        Ok(self.textures.get_mut(id))
    }

    /// Set a wrap mode. Filter parameters are stored but sampling ignores them.
    pub fn tex_parameteri(&mut self, target: GLenum, pname: GLenum, param: i32) -> GlResult<()> {
        let Some(tex) = self.bound_texture_mut(target)? else { return Ok(()) };
        let param = param as GLenum;
        match pname {
            GL_TEXTURE_WRAP_S | GL_TEXTURE_WRAP_T
                if !matches!(param, GL_REPEAT | GL_CLAMP_TO_EDGE | GL_MIRRORED_REPEAT) =>
            {
                return Err(GlError::InvalidEnum(param));
            }
            GL_TEXTURE_WRAP_S => tex.wrap_s = param,
            GL_TEXTURE_WRAP_T => tex.wrap_t = param,
            GL_TEXTURE_MIN_FILTER => tex.min_filter = param,
            GL_TEXTURE_MAG_FILTER => tex.mag_filter = param,
            other => return Err(GlError::InvalidEnum(other)),
        }
        Ok(())
    }

    /// Upload the base image of the bound texture.
    ///
    /// Mismatched formats, a nonzero border or level, and unknown pixel
    /// types are ignored with a warning.
    #[allow(clippy::too_many_arguments)]
    pub fn tex_image_2d(
        &mut self,
        target: GLenum,
        level: i32,
        internal_format: GLenum,
        width: u32,
        height: u32,
        border: i32,
        format: GLenum,
        typ: GLenum,
        pixels: &[u8],
    ) -> GlResult<()> {
        let channels = match format {
            GL_RED => 1,
            GL_RG => 2,
            GL_RGB => 3,
            GL_RGBA => 4,
            other => {
                log::warn!("tex_image_2d: unsupported format {:#x}", other);
                return Ok(());
            }
        };
        if internal_format != format || border != 0 || level != 0 || !matches!(typ, GL_FLOAT | GL_UNSIGNED_BYTE) {
            log::warn!(
                "tex_image_2d: ignored (internal format {:#x}, border {}, level {}, type {:#x})",
                internal_format,
                border,
                level,
                typ
            );
            return Ok(());
        }
        let Some(tex) = self.bound_texture_mut(target)? else {
            log::debug!("tex_image_2d with no texture bound");
            return Ok(());
        };
        tex.upload(width, height, channels, typ, pixels)
    }

    pub fn generate_mipmap(&mut self, target: GLenum) -> GlResult<()> {
        if let Some(tex) = self.bound_texture_mut(target)? {
            tex.generate_mipmaps();
            log::debug!("generate_mipmap: {} levels", tex.levels.len());
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Framebuffer
    // ══════════════════════════════════════════════════════════════════════

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) -> GlResult<()> {
        if width < 0 || height < 0 {
            return Err(GlError::InvalidValue("negative viewport size"));
        }
        self.viewport = [x, y, width, height];
        Ok(())
    }

    pub fn clear_color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.clear_rgba = [r, g, b, a];
    }

    /// Clear color and/or depth inside the viewport.
    pub fn clear(&mut self, mask: GLbitfield) {
        let [x, y, w, h] = self.viewport;
        let rect = [x, y, x + w, y + h];
        if mask & GL_COLOR_BUFFER_BIT != 0 {
            let packed = self.framebuffer.pack(self.clear_rgba);
            self.framebuffer.clear_color(rect, packed);
        }
        if mask & GL_DEPTH_BUFFER_BIT != 0 {
            self.framebuffer.clear_depth(rect);
        }
    }

    /// Packed `R<<24 | G<<16 | B<<8 | A` pixels, top row first.
    pub fn color_buffer(&self) -> &[u32] {
        &self.framebuffer.color
    }

    /// Depth values, top row first. 0 means unwritten.
    pub fn depth_buffer(&self) -> &[f32] {
        &self.framebuffer.depth
    }

    // ══════════════════════════════════════════════════════════════════════
    //  Drawing
    // ══════════════════════════════════════════════════════════════════════

    /// Draw `count` vertices from `first` of the bound vertex array with the
    /// current program. Missing bindings or an unlinked program draw nothing.
    pub fn draw_arrays(&mut self, mode: GLenum, first: i32, count: i32) -> GlResult<()> {
        if first < 0 || count < 0 {
            return Err(GlError::InvalidValue("negative vertex range"));
        }
        if count == 0 {
            return Ok(());
        }
        let program = self.current_program;
        let Some(prog) = self.shaders.get_program(program).filter(|p| p.linked) else {
            log::debug!("draw_arrays: no linked program in use");
            return Ok(());
        };
        let Some(vao) = self.vertex_arrays.get(self.bound_vertex_array) else {
            log::debug!("draw_arrays: no vertex array bound");
            return Ok(());
        };
        let buffer = vao.buffer;
        if self.buffers.get(buffer).is_none() {
            log::debug!("draw_arrays: vertex array has no buffer");
            return Ok(());
        }

        let inputs: Vec<_> = prog
            .attributes
            .iter()
            .filter(|a| a.stage == Stage::Vertex)
            .filter_map(|a| vao.attribs.iter().find(|d| d.index == a.location).map(|d| (a.var, *d)))
            .collect();
        let varyings = prog.varyings.clone();
        let (vs_id, fs_id) = (prog.vertex_shader, prog.fragment_shader);

        let (vertex_exec, fragment_exec) = self.stage_execs(program);

        let Some((vs, fs)) = self.shaders.pair_mut(vs_id, fs_id) else { return Ok(()) };
        let (Some(vertex), Some(fragment)) = (vs.compiled.as_mut(), fs.compiled.as_mut()) else {
            return Ok(());
        };
        let Some(vertex_data) = self.buffers.get(buffer).map(|b| b.data.as_slice()) else { return Ok(()) };

        let mut call = DrawCall {
            vertex,
            fragment,
            vertex_exec,
            fragment_exec,
            arena: &mut self.arena,
            samplers: SamplerView::bind(&self.textures, &self.bound_textures),
            fb: &mut self.framebuffer,
            viewport: self.viewport,
            varyings: &varyings,
            inputs: &inputs,
            vertex_data,
        };
        rasterizer::draw(&mut call, mode, first as usize, count as usize);
        Ok(())
    }

    /// How each stage of `program` runs for the next draw.
    fn stage_execs(&mut self, program: u32) -> (Exec, Exec) {
        match self.backend {
            ShaderBackend::Interpreter => (Exec::Interpret, Exec::Interpret),
            ShaderBackend::MicroOp => (Exec::MicroOp, Exec::MicroOp),
            ShaderBackend::Jit => match self.install_program(program).map(|_| self.native_entries(program)) {
                Ok(Some((vs, fs))) => (Exec::Native(vs), Exec::Native(fs)),
                Ok(None) => (Exec::MicroOp, Exec::MicroOp),
                Err(e) => {
                    log::warn!("program {}: {}; drawing with micro-ops", program, e);
                    (Exec::MicroOp, Exec::MicroOp)
                }
            },
        }
    }

    fn native_entries(&self, program: u32) -> Option<(JitFn, JitFn)> {
        self.exec.as_ref().filter(|r| r.installed() == Some(program)).and_then(|r| r.entries())
    }
}

/// Rows of an `n × n` matrix given column-major, or row-major if `transpose`.
fn matrix_rows(values: &[f32], n: usize, transpose: bool) -> GlResult<[[f32; 4]; 4]> {
    if values.len() < n * n {
        return Err(GlError::InvalidValue("matrix data too short"));
    }
    let mut rows = [[0.0f32; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate().take(n) {
        for (c, cell) in row.iter_mut().enumerate().take(n) {
            *cell = if transpose { values[r * n + c] } else { values[c * n + r] };
        }
    }
    Ok(rows)
}
