//! Tree-walking evaluator.
//!
//! Runs a [`ShaderUnit`] body directly against its variable table. This is the
//! reference semantics; the micro-op backends must agree with it everywhere
//! except texture sampling.

use alloc::vec::Vec;
use super::ast::{Ast, Builtin, Node, NodeId, ShaderUnit, Variable};
use crate::rasterizer::math;
use crate::texture::SamplerView;
use crate::value::{builtin_type, ShaderType, Value};

/// Execute every statement of `main` in order. Null statements are skipped.
pub fn run(unit: &mut ShaderUnit, samplers: &SamplerView) {
    let ShaderUnit { ast, vars, body, .. } = unit;
    for stmt in body.iter().flatten() {
        eval(ast, vars, *stmt, samplers);
    }
}

/// Evaluate one node. Ill-typed expressions produce [`Value::Unknown`].
pub fn eval(ast: &Ast, vars: &mut [Variable], id: NodeId, samplers: &SamplerView) -> Value {
    match ast.get(id) {
        Node::Const(v) => *v,
        Node::Var(var) => vars[var.index()].read(),
        Node::Binary { op, lhs, rhs } => {
            let a = eval(ast, vars, *lhs, samplers);
            let b = eval(ast, vars, *rhs, samplers);
            Value::binary(*op, a, b)
        }
        Node::Assign { target, value } => {
            let v = eval(ast, vars, *value, samplers);
            vars[target.index()].write(v);
            v
        }
        Node::Declare { var, init } => {
            let v = match init {
                Some(init) => eval(ast, vars, *init, samplers),
                None => Value::zero(vars[var.index()].ty),
            };
            vars[var.index()].write(v);
            v
        }
        Node::Swizzle { base, sel, len } => eval(ast, vars, *base, samplers).swizzle(sel, *len as usize),
        Node::Construct { ty, args } => {
            let values: Vec<Value> = args.iter().map(|a| eval(ast, vars, *a, samplers)).collect();
            Value::construct(*ty, &values)
        }
        Node::Call { func, args } => {
            let values: Vec<Value> = args.iter().map(|a| eval(ast, vars, *a, samplers)).collect();
            call(*func, &values, samplers)
        }
    }
}

fn call(func: Builtin, args: &[Value], samplers: &SamplerView) -> Value {
    let mut types = [ShaderType::Float; 2];
    if args.len() > types.len() {
        return Value::Unknown;
    }
    for (slot, arg) in types.iter_mut().zip(args) {
        match arg.ty() {
            Some(t) => *slot = t,
            None => return Value::Unknown,
        }
    }
    if builtin_type(func, &types[..args.len()]).is_none() {
        return Value::Unknown;
    }
    match (func, args) {
        (Builtin::Sin, [x]) => x.map(math::fast_sin),
        (Builtin::Cos, [x]) => x.map(math::fast_cos),
        (Builtin::Tan, [x]) => x.map(math::fast_tan),
        (Builtin::Min, [a, b]) => Value::min(*a, *b),
        (Builtin::Max, [a, b]) => Value::max(*a, *b),
        (Builtin::Texture, [Value::Sampler(unit), uv]) => {
            let uv = uv.lanes();
            Value::Vec4(samplers.sample(*unit, uv[0], uv[1]))
        }
        _ => Value::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;
    use test_log::test;

    fn run_source(src: &str) -> ShaderUnit {
        let mut unit = parse(src);
        run(&mut unit, &SamplerView::empty());
        unit
    }

    fn global(unit: &ShaderUnit, name: &str) -> Option<Value> {
        unit.find_global(name).and_then(|id| unit.var(id).value)
    }

    #[test]
    fn left_to_right_chain() {
        let unit = run_source("out float r; void main() { r = 1.0 + 2.0 * 3.0; }");
        assert_eq!(global(&unit, "r"), Some(Value::Float(9.0)));
    }

    #[test]
    fn locals_and_swizzles() {
        let unit = run_source(
            "out vec2 r; void main() { vec4 c = vec4(1.0, 2.0, 3.0, 4.0); vec3 t; t = c.wzy; r = t.yx; }",
        );
        assert_eq!(global(&unit, "r"), Some(Value::Vec2([3.0, 4.0])));
    }

    #[test]
    fn mismatched_assignment_is_ignored() {
        let unit = run_source("out vec4 r; void main() { r = vec4(1.0, 1.0, 1.0, 1.0); r = vec2(0.0, 0.0); r = 1.0 + vec2(1.0, 1.0); }");
        assert_eq!(global(&unit, "r"), Some(Value::Vec4([1.0; 4])));
    }

    #[test]
    fn builtins() {
        let unit = run_source(
            "out vec2 m; out float s; out int i; void main() { m = max(vec2(1.0, 5.0), vec2(3.0, 2.0)); s = sin(0.0); i = int(2.9); }",
        );
        assert_eq!(global(&unit, "m"), Some(Value::Vec2([3.0, 5.0])));
        assert_eq!(global(&unit, "s"), Some(Value::Float(0.0)));
        assert_eq!(global(&unit, "i"), Some(Value::Int(2)));
    }

    #[test]
    fn texture_on_unbound_unit() {
        let unit = run_source("uniform sampler2D tex; out vec4 c; void main() { c = texture(tex, vec2(0.5, 0.5)); }");
        assert_eq!(global(&unit, "c"), Some(Value::Vec4([0.0, 0.0, 0.0, 1.0])));
    }

    #[test]
    fn null_statements_are_skipped() {
        let unit = run_source("out float r; void main() { r = 2.0; r = undefined_name; r = r * 2.0; }");
        assert_eq!(global(&unit, "r"), Some(Value::Float(4.0)));
    }
}
