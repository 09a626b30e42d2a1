//! Abstract syntax tree.
//!
//! The tree is deliberately close to the surface syntax; the compiler does
//! all lowering. Interpolated strings are already desugared by the parser
//! into concatenations.

use sigil_foundation::Type;

use crate::span::Span;

/// A parsed source unit.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    /// Top-level statements in source order.
    pub statements: Vec<Stmt>,
}

/// A statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// What the statement is.
    pub kind: StmtKind,
    /// Source location.
    pub span: Span,
}

/// Statement forms.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `echo a, b;`
    Echo(Vec<Expr>),
    /// Text outside the code tags.
    InlineHtml(String),
    /// `expr;`
    Expr(Expr),
    /// `if (c) {} elseif (c) {} else {}`
    If {
        /// Condition/body pairs, `if` first then each `elseif`.
        branches: Vec<(Expr, Vec<Stmt>)>,
        /// The `else` body.
        otherwise: Option<Vec<Stmt>>,
    },
    /// `while (c) {}`
    While {
        /// Loop condition.
        cond: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `do {} while (c);`
    DoWhile {
        /// Loop body.
        body: Vec<Stmt>,
        /// Loop condition.
        cond: Expr,
    },
    /// `for (init; cond; step) {}`
    For {
        /// Initializer expressions.
        init: Vec<Expr>,
        /// Condition expressions; the last one decides.
        cond: Vec<Expr>,
        /// Step expressions.
        step: Vec<Expr>,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `foreach (subject as $k => &$v) {}`
    Foreach {
        /// The iterated expression.
        subject: Expr,
        /// Key target.
        key: Option<Expr>,
        /// Value target.
        value: Expr,
        /// True for `&$v`.
        by_ref: bool,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `function name(...) {}`
    Function(FunctionDecl),
    /// `return expr;`
    Return(Option<Expr>),
    /// `unset($a, $b[k]);`
    Unset(Vec<Expr>),
    /// `const A = 1, B = 2;`
    Const(Vec<(String, Expr)>),
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `break n;`, with `n` defaulting to 1.
    Break(u32),
    /// `continue n;`, with `n` defaulting to 1.
    Continue(u32),
    /// `throw expr;`
    Throw(Expr),
    /// `;`
    Empty,
}

/// A function declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    /// Declared name.
    pub name: String,
    /// Parameters in order.
    pub params: Vec<Param>,
    /// Declared return type, if any.
    pub return_type: Option<String>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// Source location of the whole declaration.
    pub span: Span,
}

/// A function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Variable name without the sigil.
    pub name: String,
    /// Declared type, as written.
    pub type_hint: Option<String>,
    /// Default value expression.
    pub default: Option<Expr>,
    /// True for `&$p`.
    pub by_ref: bool,
    /// True for `...$p`.
    pub variadic: bool,
}

/// An expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// What the expression is.
    pub kind: ExprKind,
    /// Source location.
    pub span: Span,
}

impl Expr {
    /// Creates an expression node.
    #[must_use]
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if the expression can be assigned to.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        matches!(self.kind, ExprKind::Variable(_) | ExprKind::Dim { .. })
    }
}

/// Expression forms.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// `$name`
    Variable(String),
    /// Bare name: `true`, `PHP_EOL`, user constants.
    Constant(String),
    /// `[k => v, ...]` or `array(...)`
    Array(Vec<ArrayItem>),
    /// `$a[index]`, or `$a[]` when `index` is `None`.
    Dim {
        /// The indexed expression.
        base: Box<Expr>,
        /// The key expression.
        index: Option<Box<Expr>>,
    },
    /// `name(args)` or `$f(args)`
    Call {
        /// What is being called.
        callee: Callee,
        /// Arguments in order.
        args: Vec<Expr>,
    },
    /// `target = value`
    Assign {
        /// Assigned location.
        target: Box<Expr>,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `target = &value`
    AssignRef {
        /// Rebound variable.
        target: Box<Expr>,
        /// Referenced location.
        value: Box<Expr>,
    },
    /// `target op= value`
    AssignOp {
        /// The arithmetic/bitwise/concat operator.
        op: BinaryOp,
        /// Assigned location.
        target: Box<Expr>,
        /// Right operand.
        value: Box<Expr>,
    },
    /// `target ??= value`
    AssignCoalesce {
        /// Assigned location.
        target: Box<Expr>,
        /// Fallback value.
        value: Box<Expr>,
    },
    /// `++$x`, `$x--`, ...
    IncDec {
        /// Which of the four forms.
        op: IncDecOp,
        /// The variable.
        target: Box<Expr>,
    },
    /// Unary operator.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// Binary operator.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Short-circuiting `&&`/`and`, `||`/`or`, and `xor`.
    Logical {
        /// The operator.
        op: LogicalOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `left ?? right`
    Coalesce {
        /// Tested operand.
        left: Box<Expr>,
        /// Fallback.
        right: Box<Expr>,
    },
    /// `cond ? then : otherwise`, or `cond ?: otherwise`.
    Ternary {
        /// Condition.
        cond: Box<Expr>,
        /// Value when true; `None` for the short form.
        then: Option<Box<Expr>>,
        /// Value when false.
        otherwise: Box<Expr>,
    },
    /// `isset(a, b)`
    Isset(Vec<Expr>),
    /// `empty(a)`
    Empty(Box<Expr>),
    /// `(type) expr`
    Cast(Type, Box<Expr>),
    /// `print expr`
    Print(Box<Expr>),
}

/// The target of a call.
#[derive(Clone, Debug, PartialEq)]
pub enum Callee {
    /// A function name.
    Name(String),
    /// A computed callee such as `$f`.
    Expr(Box<Expr>),
}

/// An entry of an array literal.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayItem {
    /// Explicit key.
    pub key: Option<Expr>,
    /// The value.
    pub value: Expr,
    /// True for `&$v`.
    pub by_ref: bool,
}

/// Increment/decrement forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncDecOp {
    /// `++$x`
    PreInc,
    /// `--$x`
    PreDec,
    /// `$x++`
    PostInc,
    /// `$x--`
    PostDec,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// `-`
    Neg,
    /// `+`
    Plus,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Spaceship,
}

/// Logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&` / `and`
    And,
    /// `||` / `or`
    Or,
    /// `xor`
    Xor,
}
