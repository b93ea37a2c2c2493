//! Shader value model.
//!
//! [`Value`] is the closed set of things a shader expression can produce. The
//! typing helpers at the bottom are the single definition of which operand
//! pairings are legal; the evaluator and the micro-op lowering both go through
//! them so the two backends agree on every "unknown" result.

use crate::compiler::ast::{BinOp, Builtin};

/// Declared type of a shader variable or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
}

impl ShaderType {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "float" => Self::Float,
            "vec2" => Self::Vec2,
            "vec3" => Self::Vec3,
            "vec4" => Self::Vec4,
            "int" => Self::Int,
            "mat2" => Self::Mat2,
            "mat3" => Self::Mat3,
            "mat4" => Self::Mat4,
            "sampler2D" => Self::Sampler2D,
            _ => return None,
        })
    }

    /// Float or vector type with `width` components.
    pub fn vector(width: usize) -> Option<Self> {
        match width {
            1 => Some(Self::Float),
            2 => Some(Self::Vec2),
            3 => Some(Self::Vec3),
            4 => Some(Self::Vec4),
            _ => None,
        }
    }

    /// Components held in one arena slot (one matrix row for matrices).
    pub fn width(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Sampler2D => 1,
            Self::Vec2 | Self::Mat2 => 2,
            Self::Vec3 | Self::Mat3 => 3,
            Self::Vec4 | Self::Mat4 => 4,
        }
    }

    /// Arena slots the type occupies.
    pub fn rows(self) -> usize {
        if self.is_matrix() { self.width() } else { 1 }
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, Self::Mat2 | Self::Mat3 | Self::Mat4)
    }

    pub fn is_float_vector(self) -> bool {
        matches!(self, Self::Float | Self::Vec2 | Self::Vec3 | Self::Vec4)
    }

    /// Whether a value of type `src` may be stored into a variable of this type.
    pub fn accepts(self, src: ShaderType) -> bool {
        self == src || matches!((self, src), (Self::Int, Self::Sampler2D) | (Self::Sampler2D, Self::Int))
    }

    /// Argument count of the type's constructor, if it has one.
    pub fn constructor_arity(self) -> Option<usize> {
        match self {
            Self::Float | Self::Int => Some(1),
            Self::Vec2 => Some(2),
            Self::Vec3 => Some(3),
            Self::Vec4 => Some(4),
            _ => None,
        }
    }
}

/// A tagged shader value. Matrices are stored row by row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Int(i32),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
    Sampler(i32),
    /// Result of an ill-typed operation. Propagates silently.
    Unknown,
}

impl Value {
    pub fn ty(&self) -> Option<ShaderType> {
        Some(match self {
            Self::Float(_) => ShaderType::Float,
            Self::Vec2(_) => ShaderType::Vec2,
            Self::Vec3(_) => ShaderType::Vec3,
            Self::Vec4(_) => ShaderType::Vec4,
            Self::Int(_) => ShaderType::Int,
            Self::Mat2(_) => ShaderType::Mat2,
            Self::Mat3(_) => ShaderType::Mat3,
            Self::Mat4(_) => ShaderType::Mat4,
            Self::Sampler(_) => ShaderType::Sampler2D,
            Self::Unknown => return None,
        })
    }

    pub fn zero(ty: ShaderType) -> Self {
        Self::from_rows(ty, [[0.0; 4]; 4])
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// First row of the value, zero-padded to four lanes.
    pub fn lanes(&self) -> [f32; 4] {
        self.rows()[0]
    }

    /// All rows of the value, zero-padded. Non-matrix values fill row 0.
    pub fn rows(&self) -> [[f32; 4]; 4] {
        let mut out = [[0.0f32; 4]; 4];
        match *self {
            Self::Float(x) => out[0][0] = x,
            Self::Vec2(v) => out[0][..2].copy_from_slice(&v),
            Self::Vec3(v) => out[0][..3].copy_from_slice(&v),
            Self::Vec4(v) => out[0] = v,
            Self::Int(i) | Self::Sampler(i) => out[0][0] = i as f32,
            Self::Mat2(m) => for (dst, row) in out.iter_mut().zip(m.iter()) { dst[..2].copy_from_slice(row) },
            Self::Mat3(m) => for (dst, row) in out.iter_mut().zip(m.iter()) { dst[..3].copy_from_slice(row) },
            Self::Mat4(m) => out = m,
            Self::Unknown => {}
        }
        out
    }

    /// Build a non-matrix value from lanes. Extra lanes are ignored.
    pub fn from_lanes(ty: ShaderType, lanes: [f32; 4]) -> Self {
        if ty.is_matrix() {
            return Self::Unknown;
        }
        Self::from_rows(ty, [lanes, [0.0; 4], [0.0; 4], [0.0; 4]])
    }

    pub fn from_rows(ty: ShaderType, r: [[f32; 4]; 4]) -> Self {
        match ty {
            ShaderType::Float => Self::Float(r[0][0]),
            ShaderType::Vec2 => Self::Vec2([r[0][0], r[0][1]]),
            ShaderType::Vec3 => Self::Vec3([r[0][0], r[0][1], r[0][2]]),
            ShaderType::Vec4 => Self::Vec4(r[0]),
            ShaderType::Int => Self::Int(r[0][0] as i32),
            ShaderType::Sampler2D => Self::Sampler(r[0][0] as i32),
            ShaderType::Mat2 => Self::Mat2([[r[0][0], r[0][1]], [r[1][0], r[1][1]]]),
            ShaderType::Mat3 => Self::Mat3([
                [r[0][0], r[0][1], r[0][2]],
                [r[1][0], r[1][1], r[1][2]],
                [r[2][0], r[2][1], r[2][2]],
            ]),
            ShaderType::Mat4 => Self::Mat4(r),
        }
    }

    /// Copy the value into consecutive arena slots, one per row.
    pub fn write_slots(&self, slots: &mut [[f32; 4]]) {
        let Some(ty) = self.ty() else { return };
        let rows = self.rows();
        for (dst, row) in slots.iter_mut().zip(rows.iter()).take(ty.rows()) {
            *dst = *row;
        }
    }

    pub fn read_slots(ty: ShaderType, slots: &[[f32; 4]]) -> Self {
        let mut rows = [[0.0f32; 4]; 4];
        for (dst, src) in rows.iter_mut().zip(slots.iter()).take(ty.rows()) {
            *dst = *src;
        }
        Self::from_rows(ty, rows)
    }

    /// Convert for storage into a variable of type `ty`, if allowed.
    pub fn convert_to(self, ty: ShaderType) -> Option<Self> {
        match (ty, self) {
            (ShaderType::Int, Self::Sampler(i)) => Some(Self::Int(i)),
            (ShaderType::Sampler2D, Self::Int(i)) => Some(Self::Sampler(i)),
            _ if self.ty() == Some(ty) => Some(self),
            _ => None,
        }
    }

    pub fn binary(op: BinOp, a: Value, b: Value) -> Value {
        let (Some(ta), Some(tb)) = (a.ty(), b.ty()) else { return Self::Unknown };
        let Some(ty) = binary_type(op, ta, tb) else { return Self::Unknown };

        if let (Self::Int(x), Self::Int(y)) = (a, b) {
            return Self::Int(int_op(op, x, y));
        }
        if ta.is_matrix() {
            let n = ta.rows();
            let (ra, rb) = (a.rows(), b.rows());
            return match (op, tb.is_matrix()) {
                (BinOp::Mul, true) => Self::from_rows(ty, mat_mul(&ra, &rb, n)),
                (BinOp::Mul, false) => Self::from_lanes(ty, mat_vec(&ra, rb[0], n)),
                _ => {
                    let mut out = [[0.0f32; 4]; 4];
                    for i in 0..n {
                        out[i] = lanewise(op, ra[i], rb[i]);
                    }
                    Self::from_rows(ty, out)
                }
            };
        }
        Self::from_lanes(ty, lanewise(op, a.lanes(), b.lanes()))
    }

    /// Select `len` components by index. Zero components is unknown.
    pub fn swizzle(&self, sel: &[u8; 4], len: usize) -> Value {
        let Some(ty) = self.ty().and_then(|t| swizzle_type(t, len)) else { return Self::Unknown };
        let src = self.lanes();
        let mut out = [0.0f32; 4];
        for i in 0..len {
            out[i] = src[sel[i] as usize];
        }
        Self::from_lanes(ty, out)
    }

    /// Type constructor: each argument contributes its first component.
    pub fn construct(ty: ShaderType, args: &[Value]) -> Value {
        let mut types = [ShaderType::Float; 4];
        for (slot, arg) in types.iter_mut().zip(args.iter()) {
            match arg.ty() {
                Some(t) => *slot = t,
                None => return Self::Unknown,
            }
        }
        if args.len() > 4 || construct_type(ty, &types[..args.len()]).is_none() {
            return Self::Unknown;
        }
        let mut out = [0.0f32; 4];
        for (lane, arg) in out.iter_mut().zip(args.iter()) {
            *lane = arg.lanes()[0];
        }
        Self::from_lanes(ty, out)
    }

    /// Apply a per-component function to a float or vector value.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Value {
        match self.ty() {
            Some(ty) if ty.is_float_vector() => {
                let mut l = self.lanes();
                for x in l.iter_mut().take(ty.width()) {
                    *x = f(*x);
                }
                Self::from_lanes(ty, l)
            }
            _ => Self::Unknown,
        }
    }

    pub fn min(a: Value, b: Value) -> Value {
        Self::pick(a, b, |x, y| if x < y { x } else { y })
    }

    pub fn max(a: Value, b: Value) -> Value {
        Self::pick(a, b, |x, y| if x > y { x } else { y })
    }

    fn pick(a: Value, b: Value, f: impl Fn(f32, f32) -> f32) -> Value {
        let (Some(ta), Some(tb)) = (a.ty(), b.ty()) else { return Self::Unknown };
        if builtin_type(Builtin::Min, &[ta, tb]).is_none() {
            return Self::Unknown;
        }
        if let (Self::Int(x), Self::Int(y)) = (a, b) {
            return Self::Int(f(x as f32, y as f32) as i32);
        }
        let (la, lb) = (a.lanes(), b.lanes());
        let mut out = [0.0f32; 4];
        for i in 0..4 {
            out[i] = f(la[i], lb[i]);
        }
        Self::from_lanes(ta, out)
    }
}

// ── Typing rules ────────────────────────────────────────────────────────────

/// Result type of `a op b`, or `None` for an undefined pairing.
pub fn binary_type(op: BinOp, a: ShaderType, b: ShaderType) -> Option<ShaderType> {
    use ShaderType::*;
    if a == Sampler2D || b == Sampler2D {
        return None;
    }
    if op.is_comparison() {
        return (a == b && !a.is_matrix()).then_some(a);
    }
    if a == b {
        return Some(a);
    }
    match (op, a, b) {
        (BinOp::Mul, Mat2, Vec2) => Some(Vec2),
        (BinOp::Mul, Mat3, Vec3) => Some(Vec3),
        (BinOp::Mul, Mat4, Vec4) => Some(Vec4),
        _ => None,
    }
}

pub fn swizzle_type(base: ShaderType, len: usize) -> Option<ShaderType> {
    if !base.is_float_vector() {
        return None;
    }
    ShaderType::vector(len)
}

pub fn construct_type(ty: ShaderType, args: &[ShaderType]) -> Option<ShaderType> {
    let arity = ty.constructor_arity()?;
    let ok = args.len() == arity
        && args.iter().all(|a| a.is_float_vector() || *a == ShaderType::Int);
    ok.then_some(ty)
}

pub fn builtin_type(func: Builtin, args: &[ShaderType]) -> Option<ShaderType> {
    match (func, args) {
        (Builtin::Sin | Builtin::Cos | Builtin::Tan, [t]) if t.is_float_vector() => Some(*t),
        (Builtin::Min | Builtin::Max, [a, b])
            if a == b && (a.is_float_vector() || *a == ShaderType::Int) => Some(*a),
        (Builtin::Texture, [ShaderType::Sampler2D, ShaderType::Vec2]) => Some(ShaderType::Vec4),
        _ => None,
    }
}

// ── Lane arithmetic ─────────────────────────────────────────────────────────

/// Horizontal sum in the pairing order the native backend uses.
#[inline]
pub fn hsum(p: [f32; 4]) -> f32 {
    (p[0] + p[2]) + (p[1] + p[3])
}

pub fn lane_op(op: BinOp, x: f32, y: f32) -> f32 {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
        BinOp::Lt => flag(x < y),
        BinOp::Gt => flag(x > y),
        BinOp::Eq => flag(x == y),
    }
}

fn lanewise(op: BinOp, a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [lane_op(op, a[0], b[0]), lane_op(op, a[1], b[1]), lane_op(op, a[2], b[2]), lane_op(op, a[3], b[3])]
}

fn int_op(op: BinOp, x: i32, y: i32) -> i32 {
    match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div if y == 0 => x,
        BinOp::Div => x.wrapping_div(y),
        BinOp::Lt => (x < y) as i32,
        BinOp::Gt => (x > y) as i32,
        BinOp::Eq => (x == y) as i32,
    }
}

/// Row `i` of `a * b` accumulated as `sum_k a[i][k] * b[k]`, in order of `k`.
pub fn mat_mul(a: &[[f32; 4]; 4], b: &[[f32; 4]; 4], n: usize) -> [[f32; 4]; 4] {
    let mut out = [[0.0f32; 4]; 4];
    for i in 0..n {
        let mut acc = scale(b[0], a[i][0]);
        for k in 1..n {
            let term = scale(b[k], a[i][k]);
            for j in 0..4 {
                acc[j] += term[j];
            }
        }
        out[i] = acc;
    }
    out
}

pub fn mat_vec(m: &[[f32; 4]; 4], v: [f32; 4], n: usize) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for i in 0..n {
        let row = m[i];
        out[i] = hsum([row[0] * v[0], row[1] * v[1], row[2] * v[2], row[3] * v[3]]);
    }
    out
}

fn scale(v: [f32; 4], s: f32) -> [f32; 4] {
    [v[0] * s, v[1] * s, v[2] * s, v[3] * s]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn matrix_times_vector_uses_rows() {
        let m = Value::Mat2([[1.0, 2.0], [3.0, 4.0]]);
        let v = Value::Vec2([5.0, 6.0]);
        assert_eq!(Value::binary(BinOp::Mul, m, v), Value::Vec2([17.0, 39.0]));
    }

    #[test]
    fn matrix_times_matrix() {
        let a = Value::Mat2([[1.0, 2.0], [3.0, 4.0]]);
        let b = Value::Mat2([[5.0, 6.0], [7.0, 8.0]]);
        assert_eq!(Value::binary(BinOp::Mul, a, b), Value::Mat2([[19.0, 22.0], [43.0, 50.0]]));
    }

    #[test]
    fn mismatched_operands_are_unknown() {
        let a = Value::Vec3([1.0, 2.0, 3.0]);
        let b = Value::Float(2.0);
        assert!(Value::binary(BinOp::Add, a, b).is_unknown());
        assert!(Value::binary(BinOp::Mul, Value::Vec2([1.0, 1.0]), Value::Mat2([[1.0, 0.0], [0.0, 1.0]])).is_unknown());
        assert!(Value::binary(BinOp::Add, Value::Sampler(0), Value::Sampler(1)).is_unknown());
        assert!(Value::binary(BinOp::Add, Value::Unknown, Value::Float(1.0)).is_unknown());
    }

    #[test]
    fn integer_division_truncates_and_ignores_zero() {
        assert_eq!(Value::binary(BinOp::Div, Value::Int(7), Value::Int(2)), Value::Int(3));
        assert_eq!(Value::binary(BinOp::Div, Value::Int(-7), Value::Int(2)), Value::Int(-3));
        assert_eq!(Value::binary(BinOp::Div, Value::Int(7), Value::Int(0)), Value::Int(7));
    }

    #[test]
    fn comparisons_produce_flags() {
        let a = Value::Vec3([1.0, 5.0, 3.0]);
        let b = Value::Vec3([2.0, 4.0, 3.0]);
        assert_eq!(Value::binary(BinOp::Lt, a, b), Value::Vec3([1.0, 0.0, 0.0]));
        assert_eq!(Value::binary(BinOp::Eq, a, b), Value::Vec3([0.0, 0.0, 1.0]));
        assert_eq!(Value::binary(BinOp::Gt, Value::Int(3), Value::Int(2)), Value::Int(1));
        let m = Value::Mat2([[1.0, 0.0], [0.0, 1.0]]);
        assert!(Value::binary(BinOp::Eq, m, m).is_unknown());
    }

    #[test]
    fn swizzle_selects_in_order() {
        let v = Value::Vec4([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(v.swizzle(&[3, 0, 2, 0], 3), Value::Vec3([4.0, 1.0, 3.0]));
        assert_eq!(v.swizzle(&[1, 0, 0, 0], 1), Value::Float(2.0));
        assert_eq!(v.swizzle(&[1, 1, 1, 1], 4), Value::Vec4([2.0; 4]));
        assert!(v.swizzle(&[0; 4], 0).is_unknown());
        assert!(Value::Int(3).swizzle(&[0; 4], 1).is_unknown());
    }

    #[test]
    fn constructors_take_first_components() {
        let args = [Value::Vec2([0.5, 9.0]), Value::Int(2), Value::Float(0.25)];
        assert_eq!(Value::construct(ShaderType::Vec3, &args), Value::Vec3([0.5, 2.0, 0.25]));
        assert_eq!(Value::construct(ShaderType::Int, &[Value::Float(-2.7)]), Value::Int(-2));
        assert!(Value::construct(ShaderType::Vec2, &[Value::Float(1.0)]).is_unknown());
        let m = Value::Mat2([[1.0, 0.0], [0.0, 1.0]]);
        assert!(Value::construct(ShaderType::Float, &[m]).is_unknown());
    }

    #[test]
    fn slots_round_trip_matrices_by_row() {
        let m = Value::Mat3([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let mut slots = [[0.0f32; 4]; 3];
        m.write_slots(&mut slots);
        assert_eq!(slots[1], [4.0, 5.0, 6.0, 0.0]);
        assert_eq!(Value::read_slots(ShaderType::Mat3, &slots), m);
    }

    #[test]
    fn int_and_sampler_convert_both_ways() {
        assert_eq!(Value::Int(2).convert_to(ShaderType::Sampler2D), Some(Value::Sampler(2)));
        assert_eq!(Value::Sampler(1).convert_to(ShaderType::Int), Some(Value::Int(1)));
        assert_eq!(Value::Float(1.0).convert_to(ShaderType::Int), None);
    }

    #[test]
    fn min_max_componentwise() {
        let a = Value::Vec2([1.0, 4.0]);
        let b = Value::Vec2([3.0, 2.0]);
        assert_eq!(Value::min(a, b), Value::Vec2([1.0, 2.0]));
        assert_eq!(Value::max(a, b), Value::Vec2([3.0, 4.0]));
        assert!(Value::min(a, Value::Float(1.0)).is_unknown());
    }
}
