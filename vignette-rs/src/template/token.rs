//! Tokens produced by the template lexer.

/// 1-based byte offset into the template source.
///
/// Positions are reported verbatim in error messages; the EOF token sits at
/// `source.len() + 1`.
pub type Pos = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    String,
    Int,
    Ident,

    // Punctuation
    Ldbrace, // {{
    Rdbrace, // }}
    Period,
    Lbrack,
    Rbrack,
    Lparen,
    Rparen,
    Comma,
    Add,
    Eof,
}

/// A scanned token: kind, decoded literal text, source position.
///
/// `lit` holds the decoded content for `String` tokens (quotes and escapes
/// resolved), the digit run for `Int`, the name for `Ident`, and the source
/// text for punctuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lit: String,
    pub pos: Pos,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, lit: impl Into<String>, pos: Pos) -> Self {
        Token {
            kind,
            lit: lit.into(),
            pos,
        }
    }
}
