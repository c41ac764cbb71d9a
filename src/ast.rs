//! Restricted component IR.
//!
//! Generated code is parsed by oxc and lowered into this owned tree. The IR
//! only covers what a preview component needs: literals, functions, element
//! construction through calls, conditionals, loops over data, and
//! destructuring. Anything else is rejected during lowering.

use std::rc::Rc;

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRAM & STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Const,
    Let,
    Var,
}

impl DeclKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, DeclKind::Const)
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Declare {
        kind: DeclKind,
        declarations: Vec<Declarator>,
    },
    /// Hoisted to the top of the enclosing block.
    Function(Rc<FunctionDef>),
    Expr(Expr),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    ForOf {
        kind: DeclKind,
        pattern: Pattern,
        iterable: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Pattern>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Empty,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONS & PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Declared name, or the binding name for `const Foo = () => …`.
    pub name: Option<String>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub line: u32,
}

impl FunctionDef {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Concise arrow body: `() => expr`.
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(String),
    Object {
        properties: Vec<(Key, Pattern)>,
        rest: Option<String>,
    },
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    Default {
        target: Box<Pattern>,
        value: Box<Expr>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
}

#[derive(Debug, Clone)]
pub enum Key {
    Static(Rc<str>),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Item {
    Expr(Expr),
    Spread(Expr),
    /// Array elision: `[a, , b]`.
    Hole,
}

#[derive(Debug, Clone)]
pub enum Property {
    Entry(Key, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum Target {
    Ident(String),
    Member { object: Box<Expr>, property: Key },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Arith(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Template {
        quasis: Vec<String>,
        exprs: Vec<Expr>,
    },
    Ident(String),
    Array(Vec<Item>),
    Object(Vec<Property>),
    Function(Rc<FunctionDef>),
    Call {
        callee: Box<Expr>,
        args: Vec<Item>,
        optional: bool,
    },
    /// Only the error constructors are constructible.
    New {
        callee: String,
        args: Vec<Item>,
    },
    Member {
        object: Box<Expr>,
        property: Key,
        optional: bool,
    },
    /// Boundary of an optional chain: a short-circuit inside yields `undefined`.
    Chain(Box<Expr>),
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        increment: bool,
        prefix: bool,
        target: Target,
    },
    Assign {
        op: AssignOp,
        target: Target,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}
