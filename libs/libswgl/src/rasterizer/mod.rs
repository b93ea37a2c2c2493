//! Software rasterizer pipeline.
//!
//! Orchestrates one draw call:
//! attribute fetch → vertex shader → primitive assembly → near clipping →
//! perspective divide → viewport transform → rasterization → depth test →
//! fragment shader → framebuffer write.
//!
//! Points skip clipping and rasterization and shade exactly one pixel each.
//! They also skip the depth test: a point always lands and overwrites the
//! stored depth with its own `z`.

pub mod math;
pub mod vertex;
pub mod clipper;
pub mod raster;
pub mod fragment;


use alloc::vec::Vec;
use crate::buffer::VertexAttrib;
use crate::compiler::ast::VarId;
use crate::compiler::{CompiledShader, Exec};
use crate::framebuffer::SwFramebuffer;
use crate::arena::ScratchArena;
use crate::shader::Varying;
use crate::texture::SamplerView;
use crate::types::*;
use crate::value::Value;

/// A processed vertex after the vertex shader.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipVertex {
    /// Clip-space position (before perspective divide).
    pub position: [f32; 4],
    /// Vertex-stage outputs, one per program varying, in link order.
    pub varyings: Vec<Value>,
}

impl ClipVertex {
    /// Linear blend toward `other` by `t`, varyings included.
    pub fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        let mut position = self.position;
        for (p, q) in position.iter_mut().zip(other.position.iter()) {
            *p += (q - *p) * t;
        }
        let varyings = self
            .varyings
            .iter()
            .zip(other.varyings.iter())
            .map(|(a, b)| lerp_value(a, b, t))
            .collect();
        ClipVertex { position, varyings }
    }
}

/// Blend two values of the same float or vector type. Anything else keeps `a`.
pub fn lerp_value(a: &Value, b: &Value, t: f32) -> Value {
    match a.ty() {
        Some(ty) if ty.is_float_vector() && b.ty() == Some(ty) => {
            let (x, y) = (a.lanes(), b.lanes());
            let mut out = x;
            for ((o, p), q) in out.iter_mut().zip(x.iter()).zip(y.iter()) {
                *o = p + (q - p) * t;
            }
            Value::from_lanes(ty, out)
        }
        _ => *a,
    }
}

/// Weighted sum of three same-typed float or vector values. Anything else
/// takes the first vertex's value.
pub fn interpolate_value(vals: [&Value; 3], w: [f32; 3]) -> Value {
    let [a, b, c] = vals;
    match a.ty() {
        Some(ty) if ty.is_float_vector() && b.ty() == Some(ty) && c.ty() == Some(ty) => {
            let (x, y, z) = (a.lanes(), b.lanes(), c.lanes());
            let mut out = [0.0f32; 4];
            for i in 0..4 {
                out[i] = x[i] * w[0] + y[i] * w[1] + z[i] * w[2];
            }
            Value::from_lanes(ty, out)
        }
        _ => *a,
    }
}

/// Everything one draw call reads and writes, borrowed from the context.
pub struct DrawCall<'a> {
    pub vertex: &'a mut CompiledShader,
    pub fragment: &'a mut CompiledShader,
    pub vertex_exec: Exec,
    pub fragment_exec: Exec,
    pub arena: &'a mut ScratchArena,
    pub samplers: SamplerView<'a>,
    pub fb: &'a mut SwFramebuffer,
    /// `[x, y, width, height]` in pipeline pixels.
    pub viewport: [i32; 4],
    pub varyings: &'a [Varying],
    /// Vertex-stage attribute variables and the descriptor feeding each.
    pub inputs: &'a [(VarId, VertexAttrib)],
    /// Contents of the vertex array's buffer.
    pub vertex_data: &'a [u8],
}

impl DrawCall<'_> {
    /// Map a clip-space position to `[x, y, z]` pipeline pixels. `z` is kept as is.
    pub fn to_screen(&self, p: [f32; 4]) -> [f32; 3] {
        let [vx, vy, vw, vh] = self.viewport;
        let half_w = vw as f32 / 2.0;
        let half_h = vh as f32 / 2.0;
        [
            p[0] / p[3] * half_w + half_w + vx as f32,
            p[1] / p[3] * half_h + half_h + vy as f32,
            p[2],
        ]
    }

    /// Run the vertex stage for vertex `index`.
    fn shade_vertex(&mut self, index: usize, position: VarId) -> ClipVertex {
        let inputs = self.inputs;
        for (var, attrib) in inputs {
            let lanes = vertex::fetch_attribute(self.vertex_data, attrib, index);
            let Some(var) = self.vertex.unit.get_var_mut(*var) else { continue };
            let value = Value::from_lanes(var.ty, lanes);
            var.write(value);
        }

        self.vertex.execute(self.vertex_exec, self.arena, &self.samplers);

        let unit = &mut self.vertex.unit;
        let mut read = |id: VarId| unit.get_var_mut(id).map_or(Value::Unknown, |v| v.read());
        let position = read(position).lanes();
        let varyings = self.varyings.iter().map(|v| read(v.vertex)).collect();
        ClipVertex { position, varyings }
    }

    /// Load fragment inputs, run the fragment stage, and return its color.
    fn shade_fragment(&mut self, inputs: impl Iterator<Item = Value>, color: VarId) -> [f32; 4] {
        let varyings = self.varyings;
        for (v, value) in varyings.iter().zip(inputs) {
            if let Some(var) = self.fragment.unit.get_var_mut(v.fragment) {
                var.write(value);
            }
        }
        self.fragment.execute(self.fragment_exec, self.arena, &self.samplers);
        self.fragment.unit.get_var_mut(color).map_or([0.0; 4], |v| v.read().lanes())
    }
}

/// Render `count` vertices starting at `first` as `mode` primitives.
///
/// Only `GL_POINTS` and `GL_TRIANGLES` draw anything. A vertex stage without
/// `gl_Position` or a fragment stage without an `out` variable is a no-op.
pub fn draw(call: &mut DrawCall, mode: GLenum, first: usize, count: usize) {
    if mode != GL_POINTS && mode != GL_TRIANGLES {
        log::debug!("draw: unsupported primitive mode {:#x}", mode);
        return;
    }
    let Some(position) = call.vertex.unit.position() else { return };
    let Some(color) = call.fragment.unit.color_output() else {
        log::debug!("draw: fragment stage has no color output");
        return;
    };

    call.samplers.mip_level = 0.0;
    let verts: Vec<ClipVertex> = (first..first + count).map(|i| call.shade_vertex(i, position)).collect();

    if mode == GL_POINTS {
        for v in &verts {
            draw_point(call, v, color);
        }
        return;
    }

    for chunk in verts.chunks_exact(3) {
        let Ok(tri) = <&[ClipVertex; 3]>::try_from(chunk) else { continue };
        for clipped in clipper::clip_triangle(tri) {
            raster::rasterize_triangle(call, &clipped, color);
        }
    }
}

/// Shade and write a single point. No depth test; depth is always written.
fn draw_point(call: &mut DrawCall, v: &ClipVertex, color: VarId) {
    let s = call.to_screen(v.position);
    let (x, y) = (s[0] as i32, s[1] as i32);
    let [vx, vy, vw, vh] = call.viewport;
    if x < vx || y < vy || x >= vx + vw || y >= vy + vh {
        return;
    }
    let Some(idx) = call.fb.index(x, y) else { return };

    let rgba = call.shade_fragment(v.varyings.iter().copied(), color);
    fragment::write(call.fb, idx, s[2], rgba);
}
