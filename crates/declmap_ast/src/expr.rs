//! Expression trees.
//!
//! One owned enum, children boxed; no node shares or cycles. Tokens are
//! embedded directly; they carry the literal text and position, which is
//! all evaluation and diagnostics need.

use declmap_lex::Token;

/// An expression node. The root is owned by whoever invoked the builder.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Any literal: the token kind distinguishes the family.
    Literal(Token),
    /// An identifier left abstract (unresolved at this layer).
    Ident(Token),
    /// Prefix or postfix unary operator, including `sizeof`, `new`,
    /// `delete`.
    Unary {
        op: Token,
        operand: Box<Expr>,
        postfix: bool,
    },
    Binary {
        op: Token,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then_branch : else_branch`; branches may be missing in a
    /// partially built tree.
    Ternary {
        op: Token,
        cond: Box<Expr>,
        then_branch: Option<Box<Expr>>,
        else_branch: Option<Box<Expr>>,
    },
    /// Parenthesized grouping.
    Group(Box<Expr>),
    /// `callee(args...)`.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `base[index]`.
    Subscript { base: Box<Expr>, index: Box<Expr> },
    /// A named cast: `static_cast<T>(operand)` and friends. The target
    /// type is kept as raw tokens; this layer does not resolve types.
    Cast {
        keyword: Token,
        ty: Vec<Token>,
        operand: Box<Expr>,
    },
}

impl Expr {
    /// The token anchoring this node, for diagnostics.
    pub fn anchor(&self) -> Token {
        match self {
            Expr::Literal(t) | Expr::Ident(t) => *t,
            Expr::Unary { op, .. } => *op,
            Expr::Binary { op, .. } => *op,
            Expr::Ternary { op, .. } => *op,
            Expr::Group(inner) => inner.anchor(),
            Expr::Call { callee, .. } => callee.anchor(),
            Expr::Subscript { base, .. } => base.anchor(),
            Expr::Cast { keyword, .. } => *keyword,
        }
    }
}
