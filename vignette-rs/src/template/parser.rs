//! Recursive-descent template parser.
//!
//! Grammar (one level of binary precedence, `+` only, left-associative):
//!
//! ```text
//! Template   := (Literal | Parameter)*     segments fold left with ADD
//! Parameter  := '{{' Expr? '}}'
//! Expr       := Additive
//! Additive   := Primary ('+' Primary)*
//! Primary    := Operand Postfix*
//! Operand    := Literal | Ident | '(' Expr ')'
//! Postfix    := '.' Ident | '[' Expr ']' | '(' args ')'
//! ```
//!
//! A source that is exactly one parameter region parses to that
//! [`ParameterExpr`] as the root; anything that mixes literal text folds
//! into a [`BinaryExpr`] chain, which is what makes mixed templates render
//! to strings while a pure parameter keeps its native type.
//!
//! The parser does not stop at the first problem: errors accumulate in
//! source order and parsing resynchronizes at the next `}}` or `{{`, so one
//! pass reports every broken parameter in a scenario file.

use thiserror::Error;

use super::ast::{
    BasicLit, BinOp, BinaryExpr, CallExpr, Expr, Ident, IndexExpr, LitKind, ParameterExpr,
    SelectorExpr,
};
use super::lexer::Lexer;
use super::token::{Pos, Token, TokenKind};

// ── Errors ────────────────────────────────────────────────────────────────────

/// A syntax error at a byte position in the template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position {pos}: {message}")]
pub struct ParseError {
    pub pos: Pos,
    pub message: String,
}

/// Every error found in one parse, in source order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrors(Vec<ParseError>);

impl ParseErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first error in source order.
    pub fn first(&self) -> &ParseError {
        &self.0[0]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

// ── Parser ────────────────────────────────────────────────────────────────────

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    /// Tokenize `src`; lexical errors are carried into the parse result.
    pub fn new(src: &str) -> Parser {
        let (tokens, errors) = Lexer::new(src).tokenize();
        Parser {
            tokens,
            pos: 0,
            errors,
        }
    }

    /// Parse the token stream into a single root expression.
    ///
    /// Returns the accumulated error list if anything at all went wrong; the
    /// partially built tree is never handed out.
    pub fn parse(mut self) -> Result<Expr, ParseErrors> {
        let root = self.parse_template();
        if !self.errors.is_empty() {
            return Err(ParseErrors(self.errors));
        }
        // An empty source still renders: give it an empty literal.
        Ok(root.unwrap_or_else(|| {
            Expr::BasicLit(BasicLit {
                value_pos: 1,
                kind: LitKind::String,
                value: String::new(),
            })
        }))
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error_at(&mut self, pos: Pos, message: impl Into<String>) {
        self.errors.push(ParseError {
            pos,
            message: message.into(),
        });
    }

    fn error_unexpected(&mut self, tok: &Token) {
        let message = if tok.kind == TokenKind::Eof {
            "unexpected EOF".to_owned()
        } else {
            format!("unexpected token {:?}", tok.lit)
        };
        self.error_at(tok.pos, message);
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_template(&mut self) -> Option<Expr> {
        let mut root: Option<Expr> = None;
        loop {
            let seg = match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::String => {
                    let tok = self.advance();
                    Some(Expr::BasicLit(BasicLit {
                        value_pos: tok.pos,
                        kind: LitKind::String,
                        value: tok.lit,
                    }))
                }
                TokenKind::Ldbrace => self.parse_parameter(),
                _ => {
                    let tok = self.advance();
                    self.error_unexpected(&tok);
                    None
                }
            };
            if let Some(seg) = seg {
                root = Some(match root {
                    None => seg,
                    // Segments join with ADD; the op position is where the
                    // right-hand segment starts.
                    Some(x) => Expr::Binary(BinaryExpr {
                        x: Box::new(x),
                        op_pos: seg.pos(),
                        op: BinOp::Add,
                        y: Box::new(seg),
                    }),
                });
            }
        }
        root
    }

    fn parse_parameter(&mut self) -> Option<Expr> {
        let ldbrace = self.advance().pos; // {{
        if self.peek().kind == TokenKind::Rdbrace {
            let rdbrace = self.advance().pos;
            return Some(Expr::Parameter(ParameterExpr {
                ldbrace,
                x: None,
                rdbrace,
            }));
        }
        let Some(x) = self.parse_expr() else {
            self.resync_parameter();
            return None;
        };
        if self.peek().kind == TokenKind::Rdbrace {
            let rdbrace = self.advance().pos;
            return Some(Expr::Parameter(ParameterExpr {
                ldbrace,
                x: Some(Box::new(x)),
                rdbrace,
            }));
        }
        let pos = self.peek().pos;
        self.error_at(pos, r#""}}" not found"#);
        self.resync_parameter();
        None
    }

    /// Skip to just past the next `}}`, or stop at `{{` / EOF so the
    /// template loop can pick up the next segment.
    fn resync_parameter(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Rdbrace => {
                    self.advance();
                    return;
                }
                TokenKind::Ldbrace | TokenKind::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut x = self.parse_primary()?;
        while self.peek().kind == TokenKind::Add {
            let op_pos = self.advance().pos;
            let y = self.parse_primary()?;
            x = Expr::Binary(BinaryExpr {
                x: Box::new(x),
                op_pos,
                op: BinOp::Add,
                y: Box::new(y),
            });
        }
        Some(x)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let mut x = self.parse_operand()?;
        loop {
            match self.peek().kind {
                TokenKind::Period => {
                    self.advance(); // .
                    match self.peek().kind {
                        TokenKind::Ident => {
                            let tok = self.advance();
                            x = Expr::Selector(SelectorExpr {
                                x: Box::new(x),
                                sel: Ident {
                                    name_pos: tok.pos,
                                    name: tok.lit,
                                },
                            });
                        }
                        // Leave the offending token in place: the next loop
                        // pass (or the parameter close) handles it, so one
                        // broken selector yields one error.
                        TokenKind::Period => {
                            let pos = self.peek().pos;
                            self.error_at(pos, "repeated .");
                        }
                        TokenKind::Lbrack => {
                            let pos = self.peek().pos;
                            self.error_at(pos, "selector index after .");
                        }
                        _ => {
                            let tok = self.peek().clone();
                            self.error_unexpected(&tok);
                            break;
                        }
                    }
                }
                TokenKind::Lbrack => {
                    let lbrack = self.advance().pos;
                    let index = self.parse_expr()?;
                    let rbrack = if self.peek().kind == TokenKind::Rbrack {
                        self.advance().pos
                    } else {
                        let pos = self.peek().pos;
                        self.error_at(pos, r#""]" not found"#);
                        pos
                    };
                    x = Expr::Index(IndexExpr {
                        x: Box::new(x),
                        lbrack,
                        index: Box::new(index),
                        rbrack,
                    });
                }
                TokenKind::Lparen => {
                    let lparen = self.advance().pos;
                    let mut args = Vec::new();
                    if self.peek().kind != TokenKind::Rparen {
                        args.push(self.parse_expr()?);
                        while self.peek().kind == TokenKind::Comma {
                            self.advance();
                            args.push(self.parse_expr()?);
                        }
                    }
                    let rparen = if self.peek().kind == TokenKind::Rparen {
                        self.advance().pos
                    } else {
                        let pos = self.peek().pos;
                        self.error_at(pos, r#"")" not found"#);
                        pos
                    };
                    x = Expr::Call(CallExpr {
                        fun: Box::new(x),
                        lparen,
                        args,
                        rparen,
                    });
                }
                _ => break,
            }
        }
        Some(x)
    }

    fn parse_operand(&mut self) -> Option<Expr> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::String => Some(Expr::BasicLit(BasicLit {
                value_pos: tok.pos,
                kind: LitKind::String,
                value: tok.lit,
            })),
            TokenKind::Int => Some(Expr::BasicLit(BasicLit {
                value_pos: tok.pos,
                kind: LitKind::Int,
                value: tok.lit,
            })),
            TokenKind::Ident => Some(Expr::Ident(Ident {
                name_pos: tok.pos,
                name: tok.lit,
            })),
            TokenKind::Lparen => {
                // Grouping: the inner node keeps its own positions.
                let inner = self.parse_expr()?;
                if self.peek().kind == TokenKind::Rparen {
                    self.advance();
                } else {
                    let pos = self.peek().pos;
                    self.error_at(pos, r#"")" not found"#);
                }
                Some(inner)
            }
            TokenKind::Period => {
                self.error_at(tok.pos, "no parent");
                None
            }
            _ => {
                self.error_unexpected(&tok);
                None
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
