//! x86_64 JIT compiler backend for the micro-op IR.
//!
//! Compiles IR instructions to native x86_64 SSE machine code. Each instruction
//! follows a fixed template: load operands from their arena slots into XMM
//! registers, operate, store the result back. No branches are ever emitted.
//!
//! Generated code is a System V `extern "C" fn(*mut JitContext)`. On entry it
//! keeps the context pointer in R12 and the arena base in RBX; XMM0 to XMM3
//! hold operands and nothing survives between instructions.
//!
//! Slot `s` lives at `[RBX + s * 16]`. Constants are interned arena slots, so
//! the code never embeds float immediates. Emission itself is portable; only
//! running the result requires an x86_64 host.

use alloc::vec::Vec;
use core::ffi::c_void;
use super::ir::{CmpOp, Inst};
use crate::arena::Slot;
use crate::rasterizer::math;
use crate::texture::SamplerView;

/// What a compiled stage reads on entry: the arena it computes in and the
/// samplers `texture()` fetches through. Built by [`invoke`] for one call.
#[repr(C)]
pub struct JitContext {
    /// Scratch arena base: `[[f32; 4]; N]`.
    pub slots: *mut [f32; 4],
    /// The `SamplerView` for this draw, passed back to `jit_tex_fetch`.
    pub samplers: *const c_void,
}

/// Entry point of one installed stage.
pub type JitFn = unsafe extern "C" fn(ctx: *mut JitContext);

// Byte offsets into `JitContext`.
const CTX_SLOTS: i32 = 0;
const CTX_SAMPLERS: i32 = 8;

/// Growable machine-code buffer with one method per encoding the backend needs.
struct Emitter {
    code: Vec<u8>,
}

impl Emitter {
    fn new() -> Self {
        Self { code: Vec::with_capacity(1024) }
    }

    #[inline(always)]
    fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Little-endian disp32.
    #[inline(always)]
    fn emit_i32(&mut self, v: i32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    /// Little-endian imm64.
    #[inline(always)]
    fn emit_u64(&mut self, v: u64) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    /// `0100WR0B`. Only emitted when one of the bits is set.
    #[inline(always)]
    fn rex(&mut self, w: bool, r: bool, b: bool) {
        let byte = 0x40
            | if w { 0x08 } else { 0 }
            | if r { 0x04 } else { 0 }
            | if b { 0x01 } else { 0 };
        self.emit(byte);
    }

    /// `push r64`; R8 and up need REX.B.
    fn push_r64(&mut self, reg: u8) {
        if reg >= 8 { self.emit(0x41); }
        self.emit(0x50 + (reg & 7));
    }

    /// `pop r64`.
    fn pop_r64(&mut self, reg: u8) {
        if reg >= 8 { self.emit(0x41); }
        self.emit(0x58 + (reg & 7));
    }

    /// `mov reg64, [base64 + disp32]`
    fn mov_r64_mem(&mut self, dst: u8, base: u8, disp: i32) {
        self.rex(true, dst >= 8, base >= 8);
        self.emit(0x8B);
        self.modrm_disp32(dst & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `lea reg64, [base64 + disp32]`
    fn lea_r64(&mut self, dst: u8, base: u8, disp: i32) {
        self.rex(true, dst >= 8, base >= 8);
        self.emit(0x8D);
        self.modrm_disp32(dst & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `mov reg64, imm64`
    fn mov_r64_imm64(&mut self, dst: u8, imm: u64) {
        self.rex(true, false, dst >= 8);
        self.emit(0xB8 + (dst & 7));
        self.emit_u64(imm);
    }

    /// `mov dst64, src64`
    fn mov_r64_r64(&mut self, dst: u8, src: u8) {
        self.rex(true, src >= 8, dst >= 8);
        self.emit(0x89);
        self.modrm_reg(src & 7, dst & 7);
    }

    /// `sub rsp, imm8`
    fn sub_rsp_imm8(&mut self, imm: u8) {
        self.rex(true, false, false);
        self.emit(0x83);
        self.emit(0xEC);
        self.emit(imm);
    }

    /// `add rsp, imm8`
    fn add_rsp_imm8(&mut self, imm: u8) {
        self.rex(true, false, false);
        self.emit(0x83);
        self.emit(0xC4);
        self.emit(imm);
    }

    /// `call reg64`
    fn call_r64(&mut self, reg: u8) {
        if reg >= 8 { self.emit(0x41); }
        self.emit(0xFF);
        self.emit(0xD0 + (reg & 7));
    }

    /// `ret`
    fn ret(&mut self) { self.emit(0xC3); }

    // Packed-single SSE, all operands `[base + disp32]` or register.

    /// `movups xmm, [base + disp32]`
    fn movups_load(&mut self, xmm: u8, base: u8, disp: i32) {
        if xmm >= 8 || base >= 8 {
            self.rex(false, xmm >= 8, base >= 8);
        }
        self.emit(0x0F);
        self.emit(0x10);
        self.modrm_disp32(xmm & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `movups [base + disp32], xmm`
    fn movups_store(&mut self, base: u8, disp: i32, xmm: u8) {
        if xmm >= 8 || base >= 8 {
            self.rex(false, xmm >= 8, base >= 8);
        }
        self.emit(0x0F);
        self.emit(0x11);
        self.modrm_disp32(xmm & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `movss xmm, [base + disp32]` (zeroes the upper lanes)
    fn movss_load(&mut self, xmm: u8, base: u8, disp: i32) {
        self.emit(0xF3);
        if xmm >= 8 || base >= 8 {
            self.rex(false, xmm >= 8, base >= 8);
        }
        self.emit(0x0F);
        self.emit(0x10);
        self.modrm_disp32(xmm & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `movss [base + disp32], xmm`
    fn movss_store(&mut self, base: u8, disp: i32, xmm: u8) {
        self.emit(0xF3);
        if xmm >= 8 || base >= 8 {
            self.rex(false, xmm >= 8, base >= 8);
        }
        self.emit(0x0F);
        self.emit(0x11);
        self.modrm_disp32(xmm & 7, base & 7);
        self.emit_i32(disp);
    }

    /// `movaps xmm_dst, xmm_src`
    fn movaps_rr(&mut self, dst: u8, src: u8) {
        self.sse_rr(0x28, dst, src);
    }

    /// Packed SSE operation: `op xmm_dst, xmm_src` (reg-reg form, 0F xx).
    fn sse_rr(&mut self, op: u8, dst: u8, src: u8) {
        if dst >= 8 || src >= 8 {
            self.rex(false, dst >= 8, src >= 8);
        }
        self.emit(0x0F);
        self.emit(op);
        self.modrm_reg(dst & 7, src & 7);
    }

    fn addps(&mut self, dst: u8, src: u8) { self.sse_rr(0x58, dst, src); }
    fn subps(&mut self, dst: u8, src: u8) { self.sse_rr(0x5C, dst, src); }
    fn mulps(&mut self, dst: u8, src: u8) { self.sse_rr(0x59, dst, src); }
    fn divps(&mut self, dst: u8, src: u8) { self.sse_rr(0x5E, dst, src); }
    fn minps(&mut self, dst: u8, src: u8) { self.sse_rr(0x5D, dst, src); }
    fn maxps(&mut self, dst: u8, src: u8) { self.sse_rr(0x5F, dst, src); }
    fn xorps(&mut self, dst: u8, src: u8) { self.sse_rr(0x57, dst, src); }
    fn andps(&mut self, dst: u8, src: u8) { self.sse_rr(0x54, dst, src); }
    fn andnps(&mut self, dst: u8, src: u8) { self.sse_rr(0x55, dst, src); }
    fn orps(&mut self, dst: u8, src: u8) { self.sse_rr(0x56, dst, src); }

    /// `cmpps xmm_dst, xmm_src, pred` (0 = eq, 1 = lt, 4 = neq).
    fn cmpps(&mut self, dst: u8, src: u8, pred: u8) {
        self.sse_rr(0xC2, dst, src);
        self.emit(pred);
    }

    /// `shufps dst, src, imm8`
    fn shufps(&mut self, dst: u8, src: u8, imm: u8) {
        self.sse_rr(0xC6, dst, src);
        self.emit(imm);
    }

    /// `cvttps2dq xmm_dst, xmm_src` (truncate to packed i32)
    fn cvttps2dq(&mut self, dst: u8, src: u8) {
        self.emit(0xF3);
        self.sse_rr(0x5B, dst, src);
    }

    /// `cvtdq2ps xmm_dst, xmm_src`
    fn cvtdq2ps(&mut self, dst: u8, src: u8) {
        self.sse_rr(0x5B, dst, src);
    }

    /// Register-direct ModRM (`mod = 11`).
    #[inline(always)]
    fn modrm_reg(&mut self, reg: u8, rm: u8) {
        self.emit(0xC0 | ((reg & 7) << 3) | (rm & 7));
    }

    /// `[base + disp32]` ModRM (`mod = 10`), with the SIB byte RSP/R12 bases require.
    #[inline(always)]
    fn modrm_disp32(&mut self, reg: u8, rm: u8) {
        if rm == 4 {
            self.emit(0x80 | ((reg & 7) << 3) | 4);
            self.emit(0x24);
        } else {
            self.emit(0x80 | ((reg & 7) << 3) | (rm & 7));
        }
    }
}

// Register encodings.
const RAX: u8 = 0;
const RBX: u8 = 3;
const RSP: u8 = 4;
const RSI: u8 = 6;
const RDI: u8 = 7;
const R12: u8 = 12;

const XMM0: u8 = 0;
const XMM1: u8 = 1;
const XMM2: u8 = 2;
const XMM3: u8 = 3;

/// cmpps predicates.
const CMP_EQ: u8 = 0;
const CMP_LT: u8 = 1;
const CMP_NEQ: u8 = 4;

/// Byte offset of an arena slot.
#[inline(always)]
fn slot_off(s: Slot) -> i32 {
    (s as i32) * 16
}

// Rust functions the generated code calls through RAX.

extern "C" fn jit_sin(x: f32) -> f32 {
    math::fast_sin(x)
}

extern "C" fn jit_cos(x: f32) -> f32 {
    math::fast_cos(x)
}

extern "C" fn jit_tan(x: f32) -> f32 {
    math::fast_tan(x)
}

/// Base-level texel fetch. Writes four floats to `out`.
extern "C" fn jit_tex_fetch(samplers: *const c_void, unit: f32, u: f32, v: f32, out: *mut [f32; 4]) {
    // SAFETY: `samplers` is the `SamplerView` the caller put in the JitContext,
    // and `out` points at an arena slot.
    unsafe {
        let view = &*(samplers as *const SamplerView<'_>);
        *out = view.fetch_base(unit as i32, u, v);
    }
}


/// Compile a micro-op program to x86_64 machine code.
pub fn compile(code: &[Inst]) -> Vec<u8> {
    let mut e = Emitter::new();

    // Entry RSP is 8 mod 16; two pushes plus 8 bytes keep calls aligned.
    e.push_r64(RBX);
    e.push_r64(R12);
    e.sub_rsp_imm8(8);
    e.mov_r64_r64(R12, RDI);
    e.mov_r64_mem(RBX, R12, CTX_SLOTS);

    for inst in code {
        emit_instruction(&mut e, inst);
    }

    e.add_rsp_imm8(8);
    e.pop_r64(R12);
    e.pop_r64(RBX);
    e.ret();
    e.code
}

fn emit_instruction(e: &mut Emitter, inst: &Inst) {
    match *inst {
        Inst::Mov(dst, src) => {
            if dst != src {
                e.movups_load(XMM0, RBX, slot_off(src));
                e.movups_store(RBX, slot_off(dst), XMM0);
            }
        }
        Inst::Add(dst, a, b) => emit_binop(e, dst, a, b, |e| e.addps(XMM0, XMM1)),
        Inst::Sub(dst, a, b) => emit_binop(e, dst, a, b, |e| e.subps(XMM0, XMM1)),
        Inst::Mul(dst, a, b) => emit_binop(e, dst, a, b, |e| e.mulps(XMM0, XMM1)),
        Inst::Div(dst, a, b) => emit_binop(e, dst, a, b, |e| e.divps(XMM0, XMM1)),
        Inst::Min(dst, a, b) => emit_binop(e, dst, a, b, |e| e.minps(XMM0, XMM1)),
        Inst::Max(dst, a, b) => emit_binop(e, dst, a, b, |e| e.maxps(XMM0, XMM1)),
        Inst::And(dst, a, mask) => emit_binop(e, dst, a, mask, |e| e.andps(XMM0, XMM1)),
        Inst::IDiv(dst, a, b) => emit_idiv(e, dst, a, b),
        Inst::Cmp(op, dst, a, b, ones) => emit_cmp(e, op, dst, a, b, ones),
        Inst::Sin(dst, src) => emit_per_component_call(e, dst, src, jit_sin as usize),
        Inst::Cos(dst, src) => emit_per_component_call(e, dst, src, jit_cos as usize),
        Inst::Tan(dst, src) => emit_per_component_call(e, dst, src, jit_tan as usize),
        Inst::Trunc(dst, src) => {
            e.movups_load(XMM0, RBX, slot_off(src));
            e.cvttps2dq(XMM0, XMM0);
            e.cvtdq2ps(XMM0, XMM0);
            e.movups_store(RBX, slot_off(dst), XMM0);
        }
        Inst::Swizzle(dst, src, sel, len) => emit_swizzle(e, dst, src, &sel, len),
        Inst::Construct(dst, srcs, n) => emit_construct(e, dst, &srcs, n),
        Inst::MatVec(dst, m, v, n) => emit_matvec(e, dst, m, v, n),
        Inst::MatMul(dst, a, b, n) => emit_matmul(e, dst, a, b, n),
        Inst::TexSample(dst, unit, coord) => emit_tex_sample(e, dst, unit, coord),
    }
}


/// `dst = a <op> b` through XMM0 and XMM1.
fn emit_binop(e: &mut Emitter, dst: Slot, a: Slot, b: Slot, op: fn(&mut Emitter)) {
    e.movups_load(XMM0, RBX, slot_off(a));
    e.movups_load(XMM1, RBX, slot_off(b));
    op(e);
    e.movups_store(RBX, slot_off(dst), XMM0);
}

/// Truncating divide; lanes with a zero divisor keep the dividend.
fn emit_idiv(e: &mut Emitter, dst: Slot, a: Slot, b: Slot) {
    e.movups_load(XMM0, RBX, slot_off(a));
    e.movups_load(XMM1, RBX, slot_off(b));
    // xmm2 = trunc(a / b)
    e.movaps_rr(XMM2, XMM0);
    e.divps(XMM2, XMM1);
    e.cvttps2dq(XMM2, XMM2);
    e.cvtdq2ps(XMM2, XMM2);
    // Lanes where the divisor is nonzero.
    e.xorps(XMM3, XMM3);
    e.cmpps(XMM3, XMM1, CMP_NEQ);
    // (quotient & mask) | (a & ~mask)
    e.andps(XMM2, XMM3);
    e.andnps(XMM3, XMM0);
    e.orps(XMM2, XMM3);
    e.movups_store(RBX, slot_off(dst), XMM2);
}

/// Lane compare, then AND with the `ones` slot.
fn emit_cmp(e: &mut Emitter, op: CmpOp, dst: Slot, a: Slot, b: Slot, ones: Slot) {
    // a > b is b < a
    let (lhs, rhs, pred) = match op {
        CmpOp::Lt => (a, b, CMP_LT),
        CmpOp::Gt => (b, a, CMP_LT),
        CmpOp::Eq => (a, b, CMP_EQ),
    };
    e.movups_load(XMM0, RBX, slot_off(lhs));
    e.movups_load(XMM1, RBX, slot_off(rhs));
    e.cmpps(XMM0, XMM1, pred);
    e.movups_load(XMM1, RBX, slot_off(ones));
    e.andps(XMM0, XMM1);
    e.movups_store(RBX, slot_off(dst), XMM0);
}

/// Call a scalar C-ABI helper on each of the 4 lanes.
fn emit_per_component_call(e: &mut Emitter, dst: Slot, src: Slot, func: usize) {
    for lane in 0..4 {
        e.movss_load(XMM0, RBX, slot_off(src) + lane * 4);
        e.mov_r64_imm64(RAX, func as u64);
        e.call_r64(RAX);
        e.movss_store(RBX, slot_off(dst) + lane * 4, XMM0);
    }
}

/// Emit swizzle: selected lanes in order, the rest zeroed.
fn emit_swizzle(e: &mut Emitter, dst: Slot, src: Slot, sel: &[u8; 4], len: u8) {
    e.movups_load(XMM0, RBX, slot_off(src));

    if len == 4 {
        let imm = (sel[0] & 3) | ((sel[1] & 3) << 2) | ((sel[2] & 3) << 4) | ((sel[3] & 3) << 6);
        e.shufps(XMM0, XMM0, imm);
    } else {
        // General case: spill to the stack and gather lanes.
        e.sub_rsp_imm8(32);
        e.movups_store(RSP, 0, XMM0);
        e.xorps(XMM1, XMM1);
        e.movups_store(RSP, 16, XMM1);
        for i in 0..len as usize {
            e.movss_load(XMM1, RSP, (sel[i] & 3) as i32 * 4);
            e.movss_store(RSP, 16 + i as i32 * 4, XMM1);
        }
        e.movups_load(XMM0, RSP, 16);
        e.add_rsp_imm8(32);
    }

    e.movups_store(RBX, slot_off(dst), XMM0);
}

/// Gather lane 0 of up to four slots.
fn emit_construct(e: &mut Emitter, dst: Slot, srcs: &[Slot; 4], n: u8) {
    e.sub_rsp_imm8(16);
    e.xorps(XMM0, XMM0);
    e.movups_store(RSP, 0, XMM0);
    for (i, src) in srcs.iter().take(n as usize).enumerate() {
        e.movss_load(XMM0, RBX, slot_off(*src));
        e.movss_store(RSP, i as i32 * 4, XMM0);
    }
    e.movups_load(XMM0, RSP, 0);
    e.add_rsp_imm8(16);
    e.movups_store(RBX, slot_off(dst), XMM0);
}

/// `dst[i] = hsum(m[i] * v)` with the `(p0 + p2) + (p1 + p3)` pairing.
fn emit_matvec(e: &mut Emitter, dst: Slot, m: Slot, v: Slot, n: u8) {
    e.sub_rsp_imm8(16);
    e.xorps(XMM1, XMM1);
    e.movups_store(RSP, 0, XMM1);
    e.movups_load(XMM0, RBX, slot_off(v));
    for row in 0..n as Slot {
        e.movups_load(XMM1, RBX, slot_off(m + row));
        e.mulps(XMM1, XMM0);
        // (p0+p2, p1+p3, ..)
        e.movaps_rr(XMM2, XMM1);
        e.shufps(XMM2, XMM2, 0x4E);
        e.addps(XMM1, XMM2);
        // lane 0 + lane 1
        e.movaps_rr(XMM2, XMM1);
        e.shufps(XMM2, XMM2, 0xB1);
        e.addps(XMM1, XMM2);
        e.movss_store(RSP, row as i32 * 4, XMM1);
    }
    e.movups_load(XMM0, RSP, 0);
    e.add_rsp_imm8(16);
    e.movups_store(RBX, slot_off(dst), XMM0);
}

/// Row `i` of `a * b` is `sum_k a[i][k] * b[k]`, accumulated in order of `k`.
fn emit_matmul(e: &mut Emitter, dst: Slot, a: Slot, b: Slot, n: u8) {
    for row in 0..n as Slot {
        let a_row = slot_off(a + row);
        e.movss_load(XMM0, RBX, a_row);
        e.shufps(XMM0, XMM0, 0x00);
        e.movups_load(XMM1, RBX, slot_off(b));
        e.mulps(XMM1, XMM0);
        for k in 1..n as Slot {
            e.movss_load(XMM2, RBX, a_row + k as i32 * 4);
            e.shufps(XMM2, XMM2, 0x00);
            e.movups_load(XMM3, RBX, slot_off(b + k));
            e.mulps(XMM3, XMM2);
            e.addps(XMM1, XMM3);
        }
        e.movups_store(RBX, slot_off(dst + row), XMM1);
    }
}

/// Emit texture fetch via C helper, writing straight into the dst slot.
fn emit_tex_sample(e: &mut Emitter, dst: Slot, unit: Slot, coord: Slot) {
    // jit_tex_fetch(samplers: ptr, unit: f32, u: f32, v: f32, out: ptr)
    // System V: samplers → RDI, out → RSI, floats → XMM0..XMM2
    e.mov_r64_mem(RDI, R12, CTX_SAMPLERS);
    e.movss_load(XMM0, RBX, slot_off(unit));
    e.movss_load(XMM1, RBX, slot_off(coord));
    e.movss_load(XMM2, RBX, slot_off(coord) + 4);
    e.lea_r64(RSI, RBX, slot_off(dst));
    e.mov_r64_imm64(RAX, jit_tex_fetch as usize as u64);
    e.call_r64(RAX);
}

/// Run compiled code over the arena.
///
/// # Safety
/// `entry` must be code produced by [`compile`] and installed executable, for
/// a program whose slots all lie within `slots`.
pub unsafe fn invoke(entry: JitFn, slots: &mut [[f32; 4]], samplers: &SamplerView<'_>) {
    let mut ctx = JitContext {
        slots: slots.as_mut_ptr(),
        samplers: samplers as *const SamplerView<'_> as *const c_void,
    };
    entry(&mut ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn prologue_and_epilogue() {
        let code = compile(&[]);
        assert_eq!(
            code,
            [
                0x53, // push rbx
                0x41, 0x54, // push r12
                0x48, 0x83, 0xEC, 0x08, // sub rsp, 8
                0x49, 0x89, 0xFC, // mov r12, rdi
                0x49, 0x8B, 0x9C, 0x24, 0x00, 0x00, 0x00, 0x00, // mov rbx, [r12 + 0]
                0x48, 0x83, 0xC4, 0x08, // add rsp, 8
                0x41, 0x5C, // pop r12
                0x5B, // pop rbx
                0xC3, // ret
            ]
        );
    }

    #[test]
    fn add_template() {
        let code = compile(&[Inst::Add(2, 0, 1)]);
        let body = &code[18..code.len() - 8];
        assert_eq!(
            body,
            [
                0x0F, 0x10, 0x83, 0x00, 0x00, 0x00, 0x00, // movups xmm0, [rbx + 0]
                0x0F, 0x10, 0x8B, 0x10, 0x00, 0x00, 0x00, // movups xmm1, [rbx + 16]
                0x0F, 0x58, 0xC1, // addps xmm0, xmm1
                0x0F, 0x11, 0x83, 0x20, 0x00, 0x00, 0x00, // movups [rbx + 32], xmm0
            ]
        );
    }

    #[test]
    fn self_move_emits_nothing() {
        assert_eq!(compile(&[Inst::Mov(4, 4)]), compile(&[]));
    }

    #[cfg(all(target_arch = "x86_64", unix))]
    mod native {
        use super::super::*;
        use crate::arena::ScratchArena;
        use crate::compiler::executable::ExecRegion;
        use crate::compiler::{backend_sw, eval, lower, parser};
        use crate::value::Value;
        use test_log::test;

        /// Run `src` with the evaluator, the micro-op interpreter and native code,
        /// returning global `name` from each.
        fn all_three(src: &str, name: &str) -> [Value; 3] {
            let samplers = SamplerView::empty();
            let mut reference = parser::parse(src);
            eval::run(&mut reference, &samplers);
            let id = reference.find_global(name).expect("global");
            let expected = reference.var(id).value.expect("written");

            let mut unit = parser::parse(src);
            let mut arena = ScratchArena::new();
            let code = lower::lower(&mut unit, &mut arena);
            let var = unit.var(id).clone();
            let slot = var.slot.expect("slot") as usize;
            let rows = var.ty.rows();

            let mut sw_slots = arena.as_mut_slice().to_vec();
            backend_sw::execute(&code, &mut sw_slots, &samplers);
            let sw = Value::read_slots(var.ty, &sw_slots[slot..slot + rows]);

            let native = compile(&code);
            let mut region = ExecRegion::new(native.len() * 2 + 64).expect("mmap");
            region.install(1, &native, &native).expect("install");
            let (entry, _) = region.entries().expect("entries");
            unsafe { invoke(entry, arena.as_mut_slice(), &samplers) };
            let jit = Value::read_slots(var.ty, &arena.as_mut_slice()[slot..slot + rows]);
            [expected, sw, jit]
        }

        fn assert_agree(src: &str, name: &str) {
            let [eval, sw, jit] = all_three(src, name);
            assert_eq!(eval, sw, "micro-op interpreter disagrees on {src}");
            assert_eq!(eval, jit, "native code disagrees on {src}");
        }

        #[test]
        fn arithmetic_and_swizzles() {
            assert_agree(
                "out vec4 r; void main() { vec4 a = vec4(1.5, -2.0, 3.25, 0.5); r = a.wzyx * a - a / vec4(2.0, 4.0, 8.0, 3.0); }",
                "r",
            );
            assert_agree("out vec3 r; void main() { vec4 a = vec4(1.0, 2.0, 3.0, 4.0); r = a.xxy + a.wzw / a.yyy; }", "r");
        }

        #[test]
        fn matrices() {
            assert_agree(
                "uniform mat4 m; out vec4 r; void main() { mat4 n = m * m; r = n * vec4(1.0, 2.0, 3.0, 1.0) + m * vec4(0.5, 0.5, 0.5, 0.5); }",
                "r",
            );
        }

        #[test]
        fn ints_compares_and_builtins() {
            assert_agree("out int r; void main() { int a = int(-7.5); r = a / 2 - a / 0; }", "r");
            assert_agree("out vec2 r; void main() { r = (vec2(1.0, 3.0) < vec2(2.0, 2.0)) + (vec2(1.0, 3.0) > vec2(2.0, 2.0)); }", "r");
            assert_agree("out vec3 r; void main() { r = max(sin(vec3(0.5, 1.5, 7.0)), cos(vec3(0.1, 2.0, -3.0))) - tan(vec3(0.3, 0.2, 0.1)); }", "r");
        }

        #[test]
        fn unbound_texture_fetch() {
            assert_agree("uniform sampler2D s; out vec4 c; void main() { c = texture(s, vec2(0.25, 0.75)); }", "c");
        }
    }
}
