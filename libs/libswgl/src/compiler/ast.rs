//! Shader AST and variable table.
//!
//! Nodes live in a flat arena owned by the [`ShaderUnit`] and refer to each
//! other by [`NodeId`]. The tree is built once by the parser and never
//! mutated afterwards; variable values are the only state that changes
//! between invocations.

use alloc::string::String;
use alloc::vec::Vec;
use crate::arena::Slot;
use crate::value::{ShaderType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Eq,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Gt | Self::Eq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Texture,
    Sin,
    Cos,
    Tan,
    Min,
    Max,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "texture" => Self::Texture,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "min" => Self::Min,
            "max" => Self::Max,
            _ => return None,
        })
    }
}

/// Storage qualifier. A variable has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    None,
    Uniform,
    In,
    Out,
    /// `layout(location = N)` vertex attribute.
    Layout(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: ShaderType,
    pub qualifier: Qualifier,
    pub global: bool,
    /// Value buffer, allocated on first read or write.
    pub value: Option<Value>,
    /// Arena slot, assigned on first reference during lowering.
    pub slot: Option<Slot>,
}

impl Variable {
    pub fn new(name: String, ty: ShaderType, qualifier: Qualifier, global: bool) -> Self {
        Self { name, ty, qualifier, global, value: None, slot: None }
    }

    pub fn read(&mut self) -> Value {
        *self.value.get_or_insert(Value::zero(self.ty))
    }

    /// Store `v` if its type is compatible. Returns whether the write happened.
    pub fn write(&mut self, v: Value) -> bool {
        match v.convert_to(self.ty) {
            Some(v) => {
                self.value = Some(v);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Binary { op: BinOp, lhs: NodeId, rhs: NodeId },
    Assign { target: VarId, value: NodeId },
    Declare { var: VarId, init: Option<NodeId> },
    Var(VarId),
    Const(Value),
    Swizzle { base: NodeId, sel: [u8; 4], len: u8 },
    Construct { ty: ShaderType, args: Vec<NodeId> },
    Call { func: Builtin, args: Vec<NodeId> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Front-end output for one shader stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderUnit {
    pub ast: Ast,
    pub vars: Vec<Variable>,
    /// Global variables in declaration order. `gl_Position` is always first.
    pub globals: Vec<VarId>,
    /// Statements of `main`. `None` marks a statement that failed to parse.
    pub body: Vec<Option<NodeId>>,
}

impl ShaderUnit {
    pub fn add_var(&mut self, var: Variable) -> VarId {
        let global = var.global;
        self.vars.push(var);
        let id = VarId(self.vars.len() as u32 - 1);
        if global {
            self.globals.push(id);
        }
        id
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    /// Like [`Self::var_mut`], but `None` for an id from another unit.
    pub fn get_var_mut(&mut self, id: VarId) -> Option<&mut Variable> {
        self.vars.get_mut(id.index())
    }

    pub fn find_global(&self, name: &str) -> Option<VarId> {
        self.globals.iter().copied().find(|&id| self.var(id).name == name)
    }

    pub fn globals_where<'a>(&'a self, pred: impl Fn(Qualifier) -> bool + 'a) -> impl Iterator<Item = VarId> + 'a {
        self.globals.iter().copied().filter(move |&id| pred(self.var(id).qualifier))
    }

    pub fn position(&self) -> Option<VarId> {
        self.find_global("gl_Position")
    }

    /// The fragment color output: the first `out` global.
    pub fn color_output(&self) -> Option<VarId> {
        self.globals_where(|q| q == Qualifier::Out).next()
    }
}
