//! AST → IR lowering pass.
//!
//! Walks the statement list of `main` and emits micro-ops. Variables get a
//! permanent arena slot the first time they are referenced, constants are
//! interned, and every intermediate result gets a fresh temporary slot. Result
//! types are computed with the same rules the evaluator uses, so a statement
//! the evaluator would treat as unknown emits nothing here either.

use alloc::vec::Vec;
use super::ast::*;
use super::ir::*;
use crate::arena::{ScratchArena, Slot};
use crate::value::{binary_type, builtin_type, construct_type, swizzle_type, ShaderType};

/// Lowering context.
struct LowerCtx<'a> {
    insts: Vec<Inst>,
    arena: &'a mut ScratchArena,
}

/// Lower a parsed unit to micro-ops, assigning arena slots as needed.
pub fn lower(unit: &mut ShaderUnit, arena: &mut ScratchArena) -> Vec<Inst> {
    let ShaderUnit { ast, vars, body, .. } = unit;
    let mut ctx = LowerCtx { insts: Vec::new(), arena };
    for stmt in body.iter().flatten() {
        ctx.lower_node(ast, vars, *stmt);
    }
    ctx.insts
}

impl LowerCtx<'_> {
    fn var_slot(&mut self, vars: &mut [Variable], id: VarId) -> (Slot, ShaderType) {
        let var = &mut vars[id.index()];
        let ty = var.ty;
        let arena = &mut *self.arena;
        let slot = *var.slot.get_or_insert_with(|| arena.alloc(ty.rows()));
        (slot, ty)
    }

    fn temp(&mut self, ty: ShaderType) -> Slot {
        self.arena.alloc(ty.rows())
    }

    fn store(&mut self, vars: &mut [Variable], target: VarId, src: Slot, src_ty: ShaderType) {
        let (dst, ty) = self.var_slot(vars, target);
        if !ty.accepts(src_ty) {
            return;
        }
        for row in 0..ty.rows() as Slot {
            self.insts.push(Inst::Mov(dst + row, src + row));
        }
    }

    /// Emit code for one node. `None` means the result is unknown.
    fn lower_node(&mut self, ast: &Ast, vars: &mut [Variable], id: NodeId) -> Option<(Slot, ShaderType)> {
        match ast.get(id) {
            Node::Const(v) => {
                let ty = v.ty()?;
                if ty.is_matrix() {
                    return None;
                }
                Some((self.arena.intern(v.lanes()), ty))
            }
            Node::Var(var) => Some(self.var_slot(vars, *var)),
            Node::Binary { op, lhs, rhs } => {
                let (a, ta) = self.lower_node(ast, vars, *lhs)?;
                let (b, tb) = self.lower_node(ast, vars, *rhs)?;
                let ty = binary_type(*op, ta, tb)?;
                Some((self.binary(*op, a, ta, b, tb, ty), ty))
            }
            Node::Assign { target, value } => {
                let (src, ty) = self.lower_node(ast, vars, *value)?;
                self.store(vars, *target, src, ty);
                Some((src, ty))
            }
            Node::Declare { var, init } => {
                let (src, ty) = match init {
                    Some(init) => self.lower_node(ast, vars, *init)?,
                    None => {
                        let ty = vars[var.index()].ty;
                        let zero = self.arena.intern([0.0; 4]);
                        let rows = self.temp(ty);
                        for row in 0..ty.rows() as Slot {
                            self.insts.push(Inst::Mov(rows + row, zero));
                        }
                        (rows, ty)
                    }
                };
                self.store(vars, *var, src, ty);
                Some((src, ty))
            }
            Node::Swizzle { base, sel, len } => {
                let (src, base_ty) = self.lower_node(ast, vars, *base)?;
                let ty = swizzle_type(base_ty, *len as usize)?;
                let dst = self.temp(ty);
                self.insts.push(Inst::Swizzle(dst, src, *sel, *len));
                Some((dst, ty))
            }
            Node::Construct { ty, args } => {
                let (srcs, types, n) = self.lower_args(ast, vars, args)?;
                let ty = construct_type(*ty, &types[..n])?;
                let dst = self.temp(ty);
                self.insts.push(Inst::Construct(dst, srcs, n as u8));
                if ty == ShaderType::Int {
                    self.insts.push(Inst::Trunc(dst, dst));
                }
                Some((dst, ty))
            }
            Node::Call { func, args } => {
                let (srcs, types, n) = self.lower_args(ast, vars, args)?;
                let ty = builtin_type(*func, &types[..n])?;
                let dst = self.temp(ty);
                match func {
                    Builtin::Sin | Builtin::Cos | Builtin::Tan => {
                        self.insts.push(match func {
                            Builtin::Sin => Inst::Sin(dst, srcs[0]),
                            Builtin::Cos => Inst::Cos(dst, srcs[0]),
                            _ => Inst::Tan(dst, srcs[0]),
                        });
                        let mask = self.arena.lane_mask(ty.width());
                        self.insts.push(Inst::And(dst, dst, mask));
                    }
                    Builtin::Min => self.insts.push(Inst::Min(dst, srcs[0], srcs[1])),
                    Builtin::Max => self.insts.push(Inst::Max(dst, srcs[0], srcs[1])),
                    Builtin::Texture => self.insts.push(Inst::TexSample(dst, srcs[0], srcs[1])),
                }
                Some((dst, ty))
            }
        }
    }

    /// Lower up to four call or constructor arguments.
    fn lower_args(
        &mut self,
        ast: &Ast,
        vars: &mut [Variable],
        args: &[NodeId],
    ) -> Option<([Slot; 4], [ShaderType; 4], usize)> {
        if args.len() > 4 {
            return None;
        }
        let mut srcs = [0 as Slot; 4];
        let mut types = [ShaderType::Float; 4];
        for (i, arg) in args.iter().enumerate() {
            let (slot, ty) = self.lower_node(ast, vars, *arg)?;
            srcs[i] = slot;
            types[i] = ty;
        }
        Some((srcs, types, args.len()))
    }

    fn binary(&mut self, op: BinOp, a: Slot, ta: ShaderType, b: Slot, tb: ShaderType, ty: ShaderType) -> Slot {
        let dst = self.temp(ty);
        if ta.is_matrix() {
            let n = ta.rows();
            if op == BinOp::Mul && tb.is_matrix() {
                self.insts.push(Inst::MatMul(dst, a, b, n as u8));
            } else if op == BinOp::Mul {
                self.insts.push(Inst::MatVec(dst, a, b, n as u8));
            } else {
                for row in 0..n as Slot {
                    self.lanes(op, dst + row, a + row, b + row, ta);
                }
            }
            return dst;
        }
        self.lanes(op, dst, a, b, ty);
        dst
    }

    /// One slot of a componentwise binary op.
    fn lanes(&mut self, op: BinOp, dst: Slot, a: Slot, b: Slot, ty: ShaderType) {
        let width = ty.width();
        let int = ty == ShaderType::Int;
        let inst = match op {
            BinOp::Add => Inst::Add(dst, a, b),
            BinOp::Sub => Inst::Sub(dst, a, b),
            BinOp::Mul => Inst::Mul(dst, a, b),
            BinOp::Div if int => Inst::IDiv(dst, a, b),
            BinOp::Div => Inst::Div(dst, a, b),
            BinOp::Lt => Inst::Cmp(CmpOp::Lt, dst, a, b, self.arena.ones(width)),
            BinOp::Gt => Inst::Cmp(CmpOp::Gt, dst, a, b, self.arena.ones(width)),
            BinOp::Eq => Inst::Cmp(CmpOp::Eq, dst, a, b, self.arena.ones(width)),
        };
        self.insts.push(inst);
        if op == BinOp::Div && !int {
            let mask = self.arena.lane_mask(width);
            self.insts.push(Inst::And(dst, dst, mask));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;
    use test_log::test;

    fn lower_source(src: &str) -> (ShaderUnit, ScratchArena, Vec<Inst>) {
        let mut unit = parse(src);
        let mut arena = ScratchArena::new();
        let code = lower(&mut unit, &mut arena);
        (unit, arena, code)
    }

    #[test]
    fn constants_are_interned_once() {
        let (_, arena, code) = lower_source("out float r; void main() { r = 2.0 * 2.0; r = r + 2.0; }");
        let twos = arena.rows(0, arena.len()).iter().filter(|s| **s == [2.0, 0.0, 0.0, 0.0]).count();
        assert_eq!(twos, 1);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn variable_slots_are_stable() {
        let (unit, _, code) = lower_source("out vec4 c; void main() { c = vec4(1.0, 0.0, 0.0, 1.0); c = c; }");
        let slot = unit.var(unit.color_output().expect("out")).slot.expect("slot");
        assert!(code.iter().filter(|i| matches!(i, Inst::Mov(d, _) if *d == slot)).count() == 2);
    }

    #[test]
    fn matrix_ops() {
        let (_, _, code) = lower_source(
            "uniform mat3 m; in vec3 p; out vec3 r; out mat3 q; void main() { r = m * p; q = m * m; q = q + m; }",
        );
        assert!(code.iter().any(|i| matches!(i, Inst::MatVec(_, _, _, 3))));
        assert!(code.iter().any(|i| matches!(i, Inst::MatMul(_, _, _, 3))));
        assert_eq!(code.iter().filter(|i| matches!(i, Inst::Add(..))).count(), 3);
    }

    #[test]
    fn unknown_statements_emit_nothing() {
        let (_, _, code) = lower_source("out vec4 c; void main() { c = vec2(1.0, 1.0) + 1.0; c = 1.0; }");
        assert!(code.iter().all(|i| !matches!(i, Inst::Mov(..))));
    }

    #[test]
    fn float_division_masks_unused_lanes() {
        let (_, _, code) = lower_source("in vec2 a; out vec2 r; void main() { r = a / a; }");
        assert!(matches!(code[..], [Inst::Div(..), Inst::And(..), Inst::Mov(..)]));
    }
}
