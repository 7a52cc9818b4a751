//! Syntax tree for admitted scripts.
//!
//! The parser produces calls with [`Callee::Unresolved`] and qualified names as
//! [`Expr::Member`]; the transform pass replaces both before execution. Nodes
//! are immutable once built and use `Arc` so a compiled program can be shared
//! across threads.

use std::sync::Arc;

use crate::game::{Entity, Ground, Item, Primitive};
use crate::script::builtins::Builtin;

/// A literal or resolved constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    /// `None`
    None,
    /// `True`/`False`
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(Arc<str>),
    /// `Item.X`
    Item(Item),
    /// `Entity.X`
    Entity(Entity),
    /// `Ground.X`
    Ground(Ground),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `+x`
    Pos,
    /// `not x`
    Not,
}

/// Arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `|`, also set union.
    BitOr,
    /// `&`, also set intersection.
    BitAnd,
    /// `^`, also symmetric difference.
    BitXor,
}

impl BinOp {
    /// Source spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitOr => "|",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
        }
    }

    /// Whether this is `|`, `&` or `^`.
    #[must_use]
    pub const fn is_bitwise(self) -> bool {
        matches!(self, BinOp::BitOr | BinOp::BitAnd | BinOp::BitXor)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// What a call invokes.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// Not yet resolved.
    Unresolved(Arc<str>),
    /// A suspending farm primitive.
    Primitive(Primitive),
    /// The internal `print` alias.
    Print,
    /// A pure builtin.
    Builtin(Builtin),
    /// A function defined by the script.
    User(Arc<str>),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal or resolved constant.
    Const(Const),
    /// Variable reference.
    Name(Arc<str>),
    /// `Item.X` before resolution.
    Member {
        /// `Item`, `Entity` or `Ground`.
        qualifier: Arc<str>,
        /// Member name.
        member: Arc<str>,
        /// Column of the qualifier.
        column: usize,
    },
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)` or `a, b`
    Tuple(Vec<Expr>),
    /// `{k: v, ...}`; `{}` is an empty dict.
    Dict(Vec<(Expr, Expr)>),
    /// `{a, b}`
    Set(Vec<Expr>),
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Arithmetic.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Possibly chained comparison.
    Compare {
        /// First operand.
        left: Box<Expr>,
        /// Following operators and operands.
        rest: Vec<(CmpOp, Expr)>,
    },
    /// `and`/`or`.
    Logical {
        /// Operator.
        op: BoolOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `body if test else orelse`
    Conditional {
        /// Condition.
        test: Box<Expr>,
        /// Value when true.
        body: Box<Expr>,
        /// Value when false.
        orelse: Box<Expr>,
    },
    /// Function call.
    Call {
        /// Target.
        callee: Callee,
        /// Positional arguments.
        args: Vec<Expr>,
        /// Column of the callee name.
        column: usize,
    },
    /// `value[index]`
    Index {
        /// Container.
        value: Box<Expr>,
        /// Key.
        index: Box<Expr>,
    },
    /// `value[lower:upper]`
    Slice {
        /// Container.
        value: Box<Expr>,
        /// Start bound.
        lower: Option<Box<Expr>>,
        /// End bound.
        upper: Option<Box<Expr>>,
    },
}

/// Assignment targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `x = ...`
    Name(Arc<str>),
    /// `x[i] = ...`
    Index {
        /// Container.
        value: Expr,
        /// Key.
        index: Expr,
    },
    /// `a, b = ...`
    Tuple(Vec<Target>),
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Name.
    pub name: Arc<str>,
    /// Default value expression, evaluated when the `def` runs.
    pub default: Option<Expr>,
}

/// A `def` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name.
    pub name: Arc<str>,
    /// Parameters in order.
    pub params: Vec<Param>,
    /// Body.
    pub body: Vec<Stmt>,
    /// Line of the `def`.
    pub line: usize,
}

/// Statement payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for effect.
    Expr(Expr),
    /// `a = b = value`
    Assign {
        /// Targets, left to right.
        targets: Vec<Target>,
        /// Assigned value.
        value: Expr,
    },
    /// `a += value`
    AugAssign {
        /// Target.
        target: Target,
        /// Operator.
        op: BinOp,
        /// Operand.
        value: Expr,
    },
    /// `if`/`elif`/`else`
    If {
        /// Conditions and their bodies, in order.
        branches: Vec<(Expr, Vec<Stmt>)>,
        /// `else` body.
        orelse: Vec<Stmt>,
    },
    /// `while test: body`
    While {
        /// Condition.
        test: Expr,
        /// Body.
        body: Vec<Stmt>,
    },
    /// `for target in iter: body`
    For {
        /// Loop variable(s).
        target: Target,
        /// Iterable.
        iter: Expr,
        /// Body.
        body: Vec<Stmt>,
    },
    /// Function definition.
    Def(Arc<FunctionDef>),
    /// `return value`
    Return(Option<Expr>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `pass`
    Pass,
}

/// A statement and its line.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// 1-based line of the statement's first token.
    pub line: usize,
    /// Payload.
    pub kind: StmtKind,
}

/// A whole script, run as the body of one procedure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    /// Top-level statements.
    pub body: Vec<Stmt>,
}

impl Program {
    /// Names of every function the script defines, at any depth.
    #[must_use]
    pub fn defined_functions(&self) -> Vec<Arc<str>> {
        let mut names = Vec::new();
        collect_defs(&self.body, &mut names);
        names
    }
}

fn collect_defs(body: &[Stmt], names: &mut Vec<Arc<str>>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Def(def) => {
                names.push(def.name.clone());
                collect_defs(&def.body, names);
            }
            StmtKind::If { branches, orelse } => {
                for (_, branch) in branches {
                    collect_defs(branch, names);
                }
                collect_defs(orelse, names);
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => collect_defs(body, names),
            _ => {}
        }
    }
}
