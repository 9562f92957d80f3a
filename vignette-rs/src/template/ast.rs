//! Expression nodes for parsed templates.
//!
//! Every node records the byte positions of its significant tokens so that
//! diagnostics can point back into the source. A whole template parses to a
//! single [`Expr`]: a lone literal, a lone parameter, or a left-folded chain
//! of `Add` nodes joining the segments in source order.

use super::token::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    String,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
}

/// A literal: raw template text, a quoted string, or an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicLit {
    pub value_pos: Pos,
    pub kind: LitKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name_pos: Pos,
    pub name: String,
}

/// `x.sel` member access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorExpr {
    pub x: Box<Expr>,
    pub sel: Ident,
}

/// `x[index]` element access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexExpr {
    pub x: Box<Expr>,
    pub lbrack: Pos,
    pub index: Box<Expr>,
    pub rbrack: Pos,
}

/// `fun(args...)` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    pub lparen: Pos,
    pub args: Vec<Expr>,
    pub rparen: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub x: Box<Expr>,
    pub op_pos: Pos,
    pub op: BinOp,
    pub y: Box<Expr>,
}

/// One `{{ ... }}` region; `x` is absent for an empty parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterExpr {
    pub ldbrace: Pos,
    pub x: Option<Box<Expr>>,
    pub rdbrace: Pos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    BasicLit(BasicLit),
    Ident(Ident),
    Selector(SelectorExpr),
    Index(IndexExpr),
    Call(CallExpr),
    Binary(BinaryExpr),
    Parameter(ParameterExpr),
}

impl Expr {
    /// Position of the first byte of the node's source span.
    pub fn pos(&self) -> Pos {
        match self {
            Expr::BasicLit(lit) => lit.value_pos,
            Expr::Ident(id) => id.name_pos,
            Expr::Selector(sel) => sel.x.pos(),
            Expr::Index(idx) => idx.x.pos(),
            Expr::Call(call) => call.fun.pos(),
            Expr::Binary(bin) => bin.x.pos(),
            Expr::Parameter(param) => param.ldbrace,
        }
    }
}
