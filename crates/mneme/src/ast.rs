//! The interpreter's own AST.
//!
//! `parse.rs` converts the external parser's tree into these nodes; the
//! evaluator consumes nothing else. Every node carries the 1-based source
//! line it came from so runtime errors can point back at source.

use std::rc::Rc;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A parsed module: the top-level statement sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    pub(crate) body: Vec<Stmt>,
}

/// A statement with its source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

/// An expression with its source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExprNode {
    pub line: u32,
    pub kind: ExprKind,
}

impl ExprNode {
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum StmtKind {
    Expr(ExprNode),
    /// `a = b = value`, including destructuring targets.
    Assign {
        targets: Vec<Target>,
        value: ExprNode,
    },
    /// `x += value` and friends.
    AugAssign {
        target: Target,
        op: BinOp,
        value: ExprNode,
    },
    /// Annotated assignment; the annotation itself is discarded.
    AnnAssign {
        target: Target,
        value: Option<ExprNode>,
    },
    Return(Option<ExprNode>),
    Raise {
        exc: Option<ExprNode>,
        cause: Option<ExprNode>,
    },
    If {
        test: ExprNode,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: ExprNode,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        target: Target,
        iter: ExprNode,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finally: Vec<Stmt>,
    },
    With {
        context: ExprNode,
        target: Option<Target>,
        body: Vec<Stmt>,
    },
    FunctionDef(Rc<FuncDef>),
    ClassDef {
        name: String,
        bases: Vec<ExprNode>,
        body: Vec<Stmt>,
        decorators: Vec<ExprNode>,
    },
    /// `import pkg.mod [as alias]`; `binding` is the name bound in scope.
    Import {
        module: String,
        binding: String,
    },
    /// `from pkg import a [as b], ...` as `(exported, binding)` pairs.
    FromImport {
        module: String,
        names: Vec<(String, String)>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Del(Vec<Target>),
    Assert {
        test: ExprNode,
        msg: Option<ExprNode>,
    },
    Match {
        subject: ExprNode,
        cases: Vec<MatchCase>,
    },
    Pass,
    Break,
    Continue,
}

/// An assignment / deletion / loop-binding target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Target {
    Name(String),
    Attr { object: ExprNode, attr: String },
    Subscript { object: ExprNode, index: ExprNode },
    /// Tuple or list destructuring; at most one element may be `Starred`.
    Tuple(Vec<Target>),
    Starred(Box<Target>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExceptHandler {
    /// `None` for a bare `except:`. May evaluate to a type or tuple of types.
    pub exc_type: Option<ExprNode>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// A function definition shared between the defining statement and the
/// function values it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FuncDef {
    pub name: String,
    pub params: Params,
    pub body: Vec<Stmt>,
    pub decorators: Vec<ExprNode>,
    /// True when the body contains `yield` at its own nesting level.
    pub is_generator: bool,
    pub line: u32,
}

/// Function signature: positional-only, positional-or-keyword, `*args`,
/// keyword-only, `**kwargs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Params {
    pub posonly: Vec<Param>,
    pub args: Vec<Param>,
    pub vararg: Option<String>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<String>,
}

impl Params {
    /// All parameter names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.posonly
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.args.iter().map(|p| p.name.as_str()))
            .chain(self.vararg.as_deref())
            .chain(self.kwonly.iter().map(|p| p.name.as_str()))
            .chain(self.kwarg.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Param {
    pub name: String,
    /// Default value expression, evaluated once at definition time.
    pub default: Option<ExprNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<ExprNode>,
    pub body: Vec<Stmt>,
}

/// Structural patterns for `match`/`case`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Pattern {
    /// `case _:` — matches anything, binds nothing.
    Wildcard,
    /// `case name:` or `case <pattern> as name:`.
    Capture {
        name: String,
        pattern: Option<Box<Pattern>>,
    },
    /// Literal or dotted-attribute value compared with `==`.
    Value(ExprNode),
    /// `None` / `True` / `False` compared with `is`.
    Singleton(Singleton),
    /// Sequence pattern; `Star` may appear at most once among the elements.
    Sequence(Vec<Pattern>),
    /// `*rest` inside a sequence pattern; `None` name for `*_`.
    Star(Option<String>),
    Mapping {
        keys: Vec<ExprNode>,
        patterns: Vec<Pattern>,
        /// `**rest` capture of unmatched keys.
        rest: Option<String>,
    },
    Class {
        cls: ExprNode,
        positional: Vec<Pattern>,
        keyword: Vec<(String, Pattern)>,
    },
    Or(Vec<Pattern>),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) enum Singleton {
    None,
    True,
    False,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum ExprKind {
    Literal(Literal),
    FString(Vec<FStringPart>),
    Name(String),
    List(Vec<ExprNode>),
    Tuple(Vec<ExprNode>),
    Set(Vec<ExprNode>),
    Dict(Vec<DictItem>),
    /// `*expr` — valid only inside call arguments and sequence displays.
    Starred(Box<ExprNode>),
    Unary {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    Binary {
        left: Box<ExprNode>,
        op: BinOp,
        right: Box<ExprNode>,
    },
    /// Short-circuit `and`/`or` over two or more operands.
    Bool {
        op: BoolOp,
        values: Vec<ExprNode>,
    },
    /// Comparison chain: `a < b <= c` keeps all operators and comparators.
    Compare {
        left: Box<ExprNode>,
        ops: Vec<CmpOp>,
        comparators: Vec<ExprNode>,
    },
    /// `body if test else orelse`.
    Ternary {
        test: Box<ExprNode>,
        body: Box<ExprNode>,
        orelse: Box<ExprNode>,
    },
    /// Walrus: `(name := value)`.
    Named {
        name: String,
        value: Box<ExprNode>,
    },
    Call {
        func: Box<ExprNode>,
        args: Vec<ExprNode>,
        /// `Some(name)` for `name=value`, `None` for `**mapping`.
        kwargs: Vec<(Option<String>, ExprNode)>,
    },
    Attr {
        object: Box<ExprNode>,
        attr: String,
    },
    Subscript {
        object: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    Slice {
        lower: Option<Box<ExprNode>>,
        upper: Option<Box<ExprNode>>,
        step: Option<Box<ExprNode>>,
    },
    Lambda {
        params: Params,
        body: Box<ExprNode>,
    },
    ListComp {
        elt: Box<ExprNode>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<ExprNode>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<ExprNode>,
        value: Box<ExprNode>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<ExprNode>,
        generators: Vec<Comprehension>,
    },
    Yield(Option<Box<ExprNode>>),
    YieldFrom(Box<ExprNode>),
}

/// One entry in a dict display, preserving source order so mixed
/// `key: value` pairs and `**mapping` unpacks overwrite left to right.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum DictItem {
    Pair { key: ExprNode, value: ExprNode },
    Unpack(ExprNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Comprehension {
    pub target: Target,
    pub iter: ExprNode,
    pub ifs: Vec<ExprNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Literal {
    None,
    Bool(bool),
    Int(i64),
    /// Integer literal outside the i64 range.
    BigInt(BigInt),
    Float(f64),
    Str(Rc<str>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum FStringPart {
    Literal(Rc<str>),
    Interpolation {
        expr: Box<ExprNode>,
        conversion: Conversion,
        spec: Option<FormatSpecAst>,
    },
}

/// `!s` / `!r` / `!a` conversion applied before the format spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Conversion {
    None,
    Str,
    Repr,
    Ascii,
}

/// A format spec, static (`{x:>8}`) or with nested interpolations (`{x:{w}}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum FormatSpecAst {
    Static(Rc<str>),
    Dynamic(Vec<FStringPart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
    MatMul,
}

impl BinOp {
    /// The operator's source spelling, used in error messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::MatMul => "@",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}
