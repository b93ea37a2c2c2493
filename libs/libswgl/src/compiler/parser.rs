//! Best-effort recursive-descent parser.
//!
//! Builds a [`ShaderUnit`] from a token stream: the global variable table and
//! the statement list of `main`. Nothing here reports errors. A construct that
//! cannot be understood becomes a `None` statement (inside `main`) or is
//! skipped (at top level), and parsing carries on.
//!
//! Binary operators have no precedence. Operands are folded left to right in
//! the order they appear, so `a + b * c` is `(a + b) * c`.

use alloc::string::String;
use alloc::vec::Vec;
use super::ast::*;
use super::lexer::{tokenize, Token};
use crate::value::{ShaderType, Value};

/// Lexical scope inside `main`, chained to its enclosing scope.
struct Scope {
    vars: Vec<(String, VarId)>,
    parent: Option<usize>,
}

/// Parser state.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    unit: ShaderUnit,
    scopes: Vec<Scope>,
    current: Option<usize>,
    seen_main: bool,
}

/// Parse shader source into a unit. Never fails.
pub fn parse(source: &str) -> ShaderUnit {
    let tokens = tokenize(source);
    let mut p = Parser {
        tokens: &tokens,
        pos: 0,
        unit: ShaderUnit::default(),
        scopes: Vec::new(),
        current: None,
        seen_main: false,
    };
    p.unit.add_var(Variable::new(String::from("gl_Position"), ShaderType::Vec4, Qualifier::None, true));

    while !p.at_end() {
        p.parse_external();
    }
    p.unit
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat(&mut self, expected: &Token) -> Option<()> {
        match self.peek() {
            Some(tok) if tok == expected => {
                self.pos += 1;
                Some(())
            }
            _ => None,
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Some(s)
            }
            _ => None,
        }
    }

    fn expect_type(&mut self) -> Option<ShaderType> {
        match self.peek() {
            Some(Token::Type(ty)) => {
                let ty = *ty;
                self.pos += 1;
                Some(ty)
            }
            _ => None,
        }
    }

    // ── Top level ───────────────────────────────────────────────────────

    fn parse_external(&mut self) {
        let start = self.pos;
        let parsed = match self.peek() {
            Some(Token::Uniform) => {
                self.pos += 1;
                self.parse_global(Qualifier::Uniform)
            }
            Some(Token::In) => {
                self.pos += 1;
                self.parse_global(Qualifier::In)
            }
            Some(Token::Out) => {
                self.pos += 1;
                self.parse_global(Qualifier::Out)
            }
            Some(Token::Layout) => self.parse_layout(),
            Some(Token::Type(_)) | Some(Token::Void) => self.parse_function_or_global(),
            _ => None,
        };
        if parsed.is_none() {
            self.pos = start;
            self.skip_external();
        }
    }

    fn parse_global(&mut self, qualifier: Qualifier) -> Option<()> {
        let ty = self.expect_type()?;
        let name = self.expect_ident()?;
        self.eat(&Token::Semicolon)?;
        self.unit.add_var(Variable::new(name, ty, qualifier, true));
        Some(())
    }

    /// `layout(location = N) [in|out] type name;`
    fn parse_layout(&mut self) -> Option<()> {
        self.eat(&Token::Layout)?;
        self.eat(&Token::LParen)?;
        if self.expect_ident()? != "location" {
            return None;
        }
        self.eat(&Token::Eq)?;
        let location = match self.advance() {
            Some(Token::IntLiteral(n)) if *n >= 0 => *n as u32,
            _ => return None,
        };
        self.eat(&Token::RParen)?;
        let qualifier = match self.peek() {
            Some(Token::Out) => {
                self.pos += 1;
                Qualifier::Out
            }
            Some(Token::In) => {
                self.pos += 1;
                Qualifier::Layout(location)
            }
            _ => Qualifier::Layout(location),
        };
        self.parse_global(qualifier)
    }

    fn parse_function_or_global(&mut self) -> Option<()> {
        let is_void = self.eat(&Token::Void).is_some();
        let ty = if is_void { None } else { self.expect_type() };
        let name = self.expect_ident()?;

        if !is_void && self.eat(&Token::Semicolon).is_some() {
            self.unit.add_var(Variable::new(name, ty?, Qualifier::None, true));
            return Some(());
        }

        self.eat(&Token::LParen)?;
        if name != "main" || self.seen_main {
            // Only one entry function is kept; others are skipped whole.
            self.pos -= 1;
            return None;
        }
        self.seen_main = true;
        self.push_scope();
        let header = self.parse_params().and_then(|_| self.eat(&Token::LBrace));
        if header.is_some() {
            self.parse_block();
        }
        self.pop_scope();
        header
    }

    fn parse_params(&mut self) -> Option<()> {
        if self.eat(&Token::RParen).is_some() {
            return Some(());
        }
        if self.eat(&Token::Void).is_some() {
            return self.eat(&Token::RParen);
        }
        loop {
            while matches!(self.peek(), Some(Token::In) | Some(Token::Out)) {
                self.pos += 1;
            }
            let ty = self.expect_type()?;
            let name = self.expect_ident()?;
            self.declare_local(name, ty);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Some(()),
                _ => return None,
            }
        }
    }

    /// Skip one top-level construct: up to a `;` or past a balanced `{}` block.
    fn skip_external(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.advance() {
            match tok {
                Token::Semicolon if depth == 0 => return,
                Token::LBrace | Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    // ── Scopes ──────────────────────────────────────────────────────────

    fn push_scope(&mut self) {
        self.scopes.push(Scope { vars: Vec::new(), parent: self.current });
        self.current = Some(self.scopes.len() - 1);
    }

    fn pop_scope(&mut self) {
        self.current = self.current.and_then(|i| self.scopes[i].parent);
    }

    fn declare_local(&mut self, name: String, ty: ShaderType) -> VarId {
        let id = self.unit.add_var(Variable::new(name.clone(), ty, Qualifier::None, false));
        if let Some(i) = self.current {
            self.scopes[i].vars.push((name, id));
        }
        id
    }

    /// Globals first, then the scope chain from the innermost scope outwards.
    fn resolve(&self, name: &str) -> Option<VarId> {
        if let Some(id) = self.unit.find_global(name) {
            return Some(id);
        }
        let mut scope = self.current;
        while let Some(i) = scope {
            let s = &self.scopes[i];
            if let Some((_, id)) = s.vars.iter().rev().find(|(n, _)| n == name) {
                return Some(*id);
            }
            scope = s.parent;
        }
        None
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// Parse statements until the closing `}` of the current block.
    fn parse_block(&mut self) {
        loop {
            match self.peek() {
                None => return,
                Some(Token::RBrace) => {
                    self.pos += 1;
                    return;
                }
                Some(Token::LBrace) => {
                    self.pos += 1;
                    self.push_scope();
                    self.parse_block();
                    self.pop_scope();
                }
                Some(Token::Semicolon) => self.pos += 1,
                Some(Token::Return) => self.recover(),
                _ => {
                    let stmt = self.parse_statement();
                    self.unit.body.push(stmt);
                }
            }
        }
    }

    fn parse_statement(&mut self) -> Option<NodeId> {
        let node = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Type(_)), Some(Token::Ident(_))) => self.parse_declaration(),
            (Some(Token::Ident(_)), Some(Token::Eq)) => self.parse_assignment(),
            _ => self.parse_expr(),
        };
        if node.is_some() && self.eat(&Token::Semicolon).is_some() {
            return node;
        }
        self.recover();
        None
    }

    fn parse_declaration(&mut self) -> Option<NodeId> {
        let ty = self.expect_type()?;
        let name = self.expect_ident()?;
        let init = if self.eat(&Token::Eq).is_some() { Some(self.parse_expr()) } else { None };
        let var = self.declare_local(name, ty);
        match init {
            Some(None) => None,
            Some(init) => Some(self.unit.ast.push(Node::Declare { var, init })),
            None => Some(self.unit.ast.push(Node::Declare { var, init: None })),
        }
    }

    fn parse_assignment(&mut self) -> Option<NodeId> {
        let name = self.expect_ident()?;
        self.eat(&Token::Eq)?;
        let target = self.resolve(&name)?;
        let value = self.parse_expr()?;
        Some(self.unit.ast.push(Node::Assign { target, value }))
    }

    /// Skip to just past the next `;`, or up to the `}` closing the block.
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Token::Semicolon if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                Token::RBrace if depth == 0 => return,
                Token::LParen | Token::LBrace => depth += 1,
                Token::RParen | Token::RBrace => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Option<NodeId> {
        let mut lhs = self.parse_primary()?;
        while let Some(op) = self.peek().and_then(binop) {
            self.pos += 1;
            let rhs = self.parse_primary()?;
            lhs = self.unit.ast.push(Node::Binary { op, lhs, rhs });
        }
        Some(lhs)
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        let tok = self.peek()?.clone();
        if !starts_primary(&tok) {
            return None;
        }
        self.pos += 1;
        let node = match tok {
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.eat(&Token::RParen)?;
                inner
            }
            Token::Minus => {
                let value = match self.peek()? {
                    Token::IntLiteral(i) => Value::Int(i.wrapping_neg()),
                    Token::FloatLiteral(f) => Value::Float(-*f),
                    _ => return None,
                };
                self.pos += 1;
                self.unit.ast.push(Node::Const(value))
            }
            Token::IntLiteral(i) => self.unit.ast.push(Node::Const(Value::Int(i))),
            Token::FloatLiteral(f) => self.unit.ast.push(Node::Const(Value::Float(f))),
            Token::Type(ty) => {
                let args = self.parse_args()?;
                if ty.constructor_arity() != Some(args.len()) {
                    return None;
                }
                self.unit.ast.push(Node::Construct { ty, args })
            }
            Token::Ident(name) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    let func = Builtin::from_name(&name)?;
                    let args = self.parse_args()?;
                    self.unit.ast.push(Node::Call { func, args })
                } else {
                    let var = self.resolve(&name)?;
                    self.unit.ast.push(Node::Var(var))
                }
            }
            _ => return None,
        };
        self.parse_swizzles(node)
    }

    /// `( expr, expr, ... )`
    fn parse_args(&mut self) -> Option<Vec<NodeId>> {
        self.eat(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen).is_some() {
            return Some(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek()? {
                Token::Comma => self.pos += 1,
                Token::RParen => {
                    self.pos += 1;
                    return Some(args);
                }
                _ => return None,
            }
        }
    }

    fn parse_swizzles(&mut self, mut node: NodeId) -> Option<NodeId> {
        while self.eat(&Token::Dot).is_some() {
            let (sel, len) = match self.peek() {
                Some(Token::Ident(letters)) => {
                    let parsed = swizzle_indices(letters)?;
                    self.pos += 1;
                    parsed
                }
                _ => ([0; 4], 0),
            };
            node = self.unit.ast.push(Node::Swizzle { base: node, sel, len });
        }
        Some(node)
    }
}

fn starts_primary(tok: &Token) -> bool {
    matches!(
        tok,
        Token::LParen
            | Token::Minus
            | Token::IntLiteral(_)
            | Token::FloatLiteral(_)
            | Token::Type(_)
            | Token::Ident(_)
    )
}

fn binop(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Less => BinOp::Lt,
        Token::Greater => BinOp::Gt,
        Token::EqEq => BinOp::Eq,
        _ => return None,
    })
}

/// Component indices for `xyzw` / `st` letters, up to four of them.
fn swizzle_indices(letters: &str) -> Option<([u8; 4], u8)> {
    if letters.len() > 4 {
        return None;
    }
    let mut sel = [0u8; 4];
    for (i, c) in letters.bytes().enumerate() {
        sel[i] = match c {
            b'x' | b's' => 0,
            b'y' | b't' => 1,
            b'z' => 2,
            b'w' => 3,
            _ => return None,
        };
    }
    Some((sel, letters.len() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const VS: &str = "
        #version 330
        layout(location = 0) vec3 aPos;
        layout(location = 1) in vec2 aUv;
        uniform mat4 uMvp;
        out vec2 vUv;
        void main() {
            vUv = aUv;
            gl_Position = uMvp * vec4(aPos.x, aPos.y, aPos.z, 1.0);
        }
    ";

    fn body_node(unit: &ShaderUnit, i: usize) -> &Node {
        unit.ast.get(unit.body[i].expect("statement parsed"))
    }

    #[test]
    fn globals_are_tagged_in_order() {
        let unit = parse(VS);
        let names: Vec<_> = unit.globals.iter().map(|&id| unit.var(id).name.as_str()).collect();
        assert_eq!(names, ["gl_Position", "aPos", "aUv", "uMvp", "vUv"]);
        assert_eq!(unit.var(unit.globals[1]).qualifier, Qualifier::Layout(0));
        assert_eq!(unit.var(unit.globals[2]).qualifier, Qualifier::Layout(1));
        assert_eq!(unit.var(unit.globals[3]).qualifier, Qualifier::Uniform);
        assert_eq!(unit.var(unit.globals[4]).qualifier, Qualifier::Out);
        assert_eq!(unit.body.len(), 2);
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse(VS), parse(VS));
    }

    #[test]
    fn operators_fold_left_to_right() {
        let unit = parse("void main() { float a; float b; float c; a + b * c; }");
        let Node::Binary { op, lhs, .. } = body_node(&unit, 3) else { panic!("expected binary") };
        assert_eq!(*op, BinOp::Mul);
        let Node::Binary { op: inner, .. } = unit.ast.get(*lhs) else { panic!("expected binary lhs") };
        assert_eq!(*inner, BinOp::Add);
    }

    #[test]
    fn malformed_statements_become_null() {
        let src = "void main() {
            float a = nothing;
            vec2 b = vec2(1.0);
            a = 1.0 +;
            foo(a);
            float ok = 2.0;
        }";
        let unit = parse(src);
        assert_eq!(unit.body.len(), 5);
        assert!(unit.body[..4].iter().all(Option::is_none));
        assert!(unit.body[4].is_some());
    }

    #[test]
    fn negative_literals_and_subtraction() {
        let unit = parse("void main() { float a = 1.0 - -2.0; }");
        let Node::Declare { init: Some(init), .. } = body_node(&unit, 0) else { panic!() };
        let Node::Binary { op, rhs, .. } = unit.ast.get(*init) else { panic!() };
        assert_eq!(*op, BinOp::Sub);
        assert_eq!(unit.ast.get(*rhs), &Node::Const(Value::Float(-2.0)));
    }

    #[test]
    fn swizzle_forms() {
        let unit = parse("in vec4 v; void main() { v.wzx; v.st; v.; v.xyzwx; v.q; }");
        let Node::Swizzle { sel, len, .. } = body_node(&unit, 0) else { panic!() };
        assert_eq!((*sel, *len), ([3, 2, 0, 0], 3));
        let Node::Swizzle { sel, len, .. } = body_node(&unit, 1) else { panic!() };
        assert_eq!((*sel, *len), ([0, 1, 0, 0], 2));
        let Node::Swizzle { len, .. } = body_node(&unit, 2) else { panic!() };
        assert_eq!(*len, 0);
        assert!(unit.body[3].is_none());
        assert!(unit.body[4].is_none());
    }

    #[test]
    fn locals_resolve_through_scope_chain() {
        let unit = parse("void main(float p) { float a = p; { float b = a; float a = b; } a = 1.0; }");
        assert_eq!(unit.body.len(), 4);
        assert!(unit.body.iter().all(Option::is_some));
        // The trailing assignment targets the outer `a`, not the shadowing one.
        let Node::Assign { target, .. } = body_node(&unit, 3) else { panic!() };
        let Node::Declare { var, .. } = body_node(&unit, 0) else { panic!() };
        assert_eq!(target, var);
    }

    #[test]
    fn only_main_is_kept() {
        let unit = parse("vec4 helper(vec4 x) { return x; } void main() { gl_Position = vec4(1.0, 0.0, 0.0, 1.0); } void main() { 1.0; }");
        assert_eq!(unit.body.len(), 1);
        assert!(unit.body[0].is_some());
    }

    #[test]
    fn constructor_arity_is_checked() {
        let unit = parse("void main() { vec3(1.0, 2.0); int(2.5); float(1.0, 2.0); }");
        assert!(unit.body[0].is_none());
        assert!(unit.body[1].is_some());
        assert!(unit.body[2].is_none());
    }
}
