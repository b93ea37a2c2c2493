//! Portable interpreter for the micro-op IR.
//!
//! Executes instructions directly against the scratch arena. Lane semantics
//! match the native backend instruction for instruction: the same min/max
//! selection order, the same horizontal-sum pairing, the same masks.

use super::ir::*;
use crate::arena::Slot;
use crate::rasterizer::math;
use crate::texture::SamplerView;
use crate::value::hsum;

/// Run a compiled program over the arena.
pub fn execute(code: &[Inst], slots: &mut [[f32; 4]], samplers: &SamplerView) {
    for inst in code {
        exec_inst(inst, slots, samplers);
    }
}

#[inline]
fn lanes2(slots: &mut [[f32; 4]], dst: Slot, a: Slot, b: Slot, f: impl Fn(f32, f32) -> f32) {
    let ra = slots[a as usize];
    let rb = slots[b as usize];
    slots[dst as usize] = [f(ra[0], rb[0]), f(ra[1], rb[1]), f(ra[2], rb[2]), f(ra[3], rb[3])];
}

#[inline]
fn lanes1(slots: &mut [[f32; 4]], dst: Slot, src: Slot, f: impl Fn(f32) -> f32) {
    slots[dst as usize] = slots[src as usize].map(f);
}

fn exec_inst(inst: &Inst, slots: &mut [[f32; 4]], samplers: &SamplerView) {
    match *inst {
        Inst::Mov(dst, src) => {
            slots[dst as usize] = slots[src as usize];
        }
        Inst::Add(dst, a, b) => lanes2(slots, dst, a, b, |x, y| x + y),
        Inst::Sub(dst, a, b) => lanes2(slots, dst, a, b, |x, y| x - y),
        Inst::Mul(dst, a, b) => lanes2(slots, dst, a, b, |x, y| x * y),
        Inst::Div(dst, a, b) => lanes2(slots, dst, a, b, |x, y| x / y),
        Inst::IDiv(dst, a, b) => lanes2(slots, dst, a, b, |x, y| if y != 0.0 { math::trunc(x / y) } else { x }),
        Inst::Min(dst, a, b) => lanes2(slots, dst, a, b, |x, y| if x < y { x } else { y }),
        Inst::Max(dst, a, b) => lanes2(slots, dst, a, b, |x, y| if x > y { x } else { y }),
        Inst::And(dst, a, mask) => {
            lanes2(slots, dst, a, mask, |x, m| f32::from_bits(x.to_bits() & m.to_bits()));
        }
        Inst::Cmp(op, dst, a, b, ones) => {
            let ra = slots[a as usize];
            let rb = slots[b as usize];
            let one = slots[ones as usize];
            let mut out = [0.0f32; 4];
            for i in 0..4 {
                let hit = match op {
                    CmpOp::Lt => ra[i] < rb[i],
                    CmpOp::Gt => rb[i] < ra[i],
                    CmpOp::Eq => ra[i] == rb[i],
                };
                if hit {
                    out[i] = one[i];
                }
            }
            slots[dst as usize] = out;
        }
        Inst::Sin(dst, src) => lanes1(slots, dst, src, math::fast_sin),
        Inst::Cos(dst, src) => lanes1(slots, dst, src, math::fast_cos),
        Inst::Tan(dst, src) => lanes1(slots, dst, src, math::fast_tan),
        Inst::Trunc(dst, src) => lanes1(slots, dst, src, math::trunc),
        Inst::Swizzle(dst, src, sel, len) => {
            let r = slots[src as usize];
            let mut out = [0.0f32; 4];
            for i in 0..len as usize {
                out[i] = r[sel[i] as usize & 3];
            }
            slots[dst as usize] = out;
        }
        Inst::Construct(dst, srcs, n) => {
            let mut out = [0.0f32; 4];
            for i in 0..n as usize {
                out[i] = slots[srcs[i] as usize][0];
            }
            slots[dst as usize] = out;
        }
        Inst::MatVec(dst, m, v, n) => {
            let rv = slots[v as usize];
            let mut out = [0.0f32; 4];
            for i in 0..n as usize {
                let row = slots[m as usize + i];
                out[i] = hsum([row[0] * rv[0], row[1] * rv[1], row[2] * rv[2], row[3] * rv[3]]);
            }
            slots[dst as usize] = out;
        }
        Inst::MatMul(dst, a, b, n) => {
            let n = n as usize;
            let mut out = [[0.0f32; 4]; 4];
            for i in 0..n {
                let row = slots[a as usize + i];
                let mut acc = slots[b as usize].map(|x| x * row[0]);
                for k in 1..n {
                    let rb = slots[b as usize + k];
                    for j in 0..4 {
                        acc[j] += rb[j] * row[k];
                    }
                }
                out[i] = acc;
            }
            slots[dst as usize..dst as usize + n].copy_from_slice(&out[..n]);
        }
        Inst::TexSample(dst, unit, coord) => {
            let c = slots[coord as usize];
            slots[dst as usize] = samplers.fetch_base(slots[unit as usize][0] as i32, c[0], c[1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ScratchArena;
    use crate::compiler::{eval, lower, parser};
    use crate::value::Value;
    use test_log::test;

    /// Run `src` through both the evaluator and the micro-op path and return
    /// the value of global `name` from each.
    fn both(src: &str, name: &str) -> (Value, Value) {
        let mut reference = parser::parse(src);
        eval::run(&mut reference, &SamplerView::empty());
        let id = reference.find_global(name).expect("global");
        let expected = reference.var(id).value.expect("written");

        let mut unit = parser::parse(src);
        let mut arena = ScratchArena::new();
        let code = lower::lower(&mut unit, &mut arena);
        execute(&code, arena.as_mut_slice(), &SamplerView::empty());
        let var = unit.var(id);
        let slot = var.slot.expect("slot") as usize;
        let got = Value::read_slots(var.ty, &arena.as_mut_slice()[slot..slot + var.ty.rows()]);
        (expected, got)
    }

    #[test]
    fn matches_evaluator_on_vectors() {
        let (a, b) = both(
            "out vec3 r; void main() { vec3 v = vec3(1.0, 2.0, 3.0); r = v * v - vec3(0.5, 0.5, 0.5) / v.zyx; }",
            "r",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn matches_evaluator_on_matrices() {
        let (a, b) = both(
            "out vec2 r; void main() { mat2 m; vec2 p = vec2(3.0, 4.0); r = m * p + vec2(1.0, 2.0); }",
            "r",
        );
        assert_eq!(a, b);
        assert_eq!(b, Value::Vec2([1.0, 2.0]));
    }

    #[test]
    fn matches_evaluator_on_ints_and_compares() {
        let (a, b) = both("out int r; void main() { int a = int(7.9); r = a / 2 + (a / 0) * (3 < 4); }", "r");
        assert_eq!(a, Value::Int(10));
        assert_eq!(a, b);
        let (a, b) = both("out vec2 r; void main() { r = vec2(1.0, 5.0) > vec2(2.0, 2.0); }", "r");
        assert_eq!(a, b);
    }

    #[test]
    fn matches_evaluator_on_trig() {
        let (a, b) = both("out vec2 r; void main() { r = cos(vec2(0.3, 2.0)) + min(sin(vec2(1.0, 4.0)), tan(vec2(0.1, 0.2))); }", "r");
        assert_eq!(a, b);
    }

    #[test]
    fn texture_reads_unbound_as_black() {
        let (a, b) = both("uniform sampler2D s; out vec4 c; void main() { c = texture(s, vec2(0.0, 0.0)); }", "c");
        assert_eq!(a, b);
    }
}
