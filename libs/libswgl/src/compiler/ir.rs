//! Micro-op IR for compiled shaders.
//!
//! A straight-line list of operations over scratch-arena slots. Each slot holds
//! a `[f32; 4]` vector; matrices span one slot per row. There is no control
//! flow. The same list is lowered to native code by [`super::backend_jit`] or
//! interpreted by [`super::backend_sw`].

use crate::arena::Slot;

/// Lane comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Eq,
}

/// IR instruction set.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// Copy: dst = src
    Mov(Slot, Slot),

    /// Component-wise add: dst = a + b
    Add(Slot, Slot, Slot),
    /// Component-wise subtract: dst = a - b
    Sub(Slot, Slot, Slot),
    /// Component-wise multiply: dst = a * b
    Mul(Slot, Slot, Slot),
    /// Component-wise divide: dst = a / b
    Div(Slot, Slot, Slot),
    /// Truncating divide that keeps the dividend where the divisor is 0.
    IDiv(Slot, Slot, Slot),

    /// Component-wise min: dst = a < b ? a : b
    Min(Slot, Slot, Slot),
    /// Component-wise max: dst = a > b ? a : b
    Max(Slot, Slot, Slot),

    /// Bitwise and with a lane mask slot: clears unused lanes.
    And(Slot, Slot, Slot),

    /// dst = (a op b) ? ones : 0, per lane.
    Cmp(CmpOp, Slot, Slot, Slot, Slot),

    /// Sine approximation per lane.
    Sin(Slot, Slot),
    /// Cosine approximation per lane.
    Cos(Slot, Slot),
    /// Tangent approximation per lane.
    Tan(Slot, Slot),

    /// Round toward zero per lane.
    Trunc(Slot, Slot),

    /// dst = src.[sel; len], remaining lanes zeroed.
    Swizzle(Slot, Slot, [u8; 4], u8),

    /// dst = (a.x, b.x, c.x, d.x) over the first `n` sources, rest zeroed.
    Construct(Slot, [Slot; 4], u8),

    /// dst = m * v for an n×n matrix stored in n row slots.
    MatVec(Slot, Slot, Slot, u8),

    /// dst = a * b for n×n matrices, all in n row slots.
    MatMul(Slot, Slot, Slot, u8),

    /// dst = base-level texel of the unit in `unit.x` at `coord.xy`.
    TexSample(Slot, Slot, Slot),
}
