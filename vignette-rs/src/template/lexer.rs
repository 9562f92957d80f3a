//! Template lexer.
//!
//! The lexer runs in two modes. Outside a parameter region everything up to
//! the next `{{` (or end of input) is one literal run, emitted as a single
//! `String` token, so `}}` and other punctuation have no meaning there.
//! Inside `{{ ... }}` it produces expression tokens and skips whitespace,
//! including newlines, so a parameter may span lines.
//!
//! Lexical errors (a stray byte, an unterminated quoted literal) do not stop
//! the scan: the offending input is skipped and the error is collected, so
//! the parser can keep accumulating diagnostics.

use super::parser::ParseError;
use super::token::{Pos, Token, TokenKind};

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize, // 0-based byte index
    in_param: bool,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            in_param: false,
        }
    }

    /// Scan the whole source; the token stream always ends with EOF.
    pub(crate) fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(tok) => {
                    let done = tok.kind == TokenKind::Eof;
                    tokens.push(tok);
                    if done {
                        break;
                    }
                }
                Err(err) => errors.push(err),
            }
        }
        (tokens, errors)
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos + 1).copied()
    }

    fn at_ldbrace(&self) -> bool {
        self.peek() == Some(b'{') && self.peek2() == Some(b'{')
    }

    fn at_rdbrace(&self) -> bool {
        self.peek() == Some(b'}') && self.peek2() == Some(b'}')
    }

    /// 1-based position of the current byte.
    fn here(&self) -> Pos {
        self.pos + 1
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        if self.in_param {
            self.param_token()
        } else {
            self.literal_token()
        }
    }

    /// Outside parameter regions: a whole literal run, `{{`, or EOF.
    fn literal_token(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        while self.pos < self.src.len() && !self.at_ldbrace() {
            self.pos += 1;
        }
        if self.pos > start {
            return Ok(Token::new(
                TokenKind::String,
                &self.src[start..self.pos],
                start + 1,
            ));
        }
        if self.at_ldbrace() {
            let pos = self.here();
            self.pos += 2;
            self.in_param = true;
            return Ok(Token::new(TokenKind::Ldbrace, "{{", pos));
        }
        Ok(Token::new(TokenKind::Eof, "", self.here()))
    }

    /// Inside a parameter region: expression tokens, whitespace skipped.
    fn param_token(&mut self) -> Result<Token, ParseError> {
        self.skip_ws();
        if self.pos >= self.src.len() {
            return Ok(Token::new(TokenKind::Eof, "", self.here()));
        }
        if self.at_rdbrace() {
            let pos = self.here();
            self.pos += 2;
            self.in_param = false;
            return Ok(Token::new(TokenKind::Rdbrace, "}}", pos));
        }
        if self.at_ldbrace() {
            // A nested `{{` is a parse error, but it is also the parser's
            // resynchronization point, so it must come through as a token.
            let pos = self.here();
            self.pos += 2;
            return Ok(Token::new(TokenKind::Ldbrace, "{{", pos));
        }

        let pos = self.here();
        match self.src.as_bytes()[self.pos] {
            b'0'..=b'9' => Ok(self.read_int(pos)),
            b'"' => self.read_string(pos),
            c if is_ident_start(c) => Ok(self.read_ident(pos)),
            b'.' => Ok(self.punct(TokenKind::Period, ".", pos)),
            b'[' => Ok(self.punct(TokenKind::Lbrack, "[", pos)),
            b']' => Ok(self.punct(TokenKind::Rbrack, "]", pos)),
            b'(' => Ok(self.punct(TokenKind::Lparen, "(", pos)),
            b')' => Ok(self.punct(TokenKind::Rparen, ")", pos)),
            b',' => Ok(self.punct(TokenKind::Comma, ",", pos)),
            b'+' => Ok(self.punct(TokenKind::Add, "+", pos)),
            _ => {
                // Report the whole character, not its first byte.
                let ch = self.src[self.pos..].chars().next().unwrap_or('\u{fffd}');
                self.pos += ch.len_utf8();
                Err(ParseError {
                    pos,
                    message: format!("invalid character {ch:?}"),
                })
            }
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn punct(&mut self, kind: TokenKind, lit: &str, pos: Pos) -> Token {
        self.pos += lit.len();
        Token::new(kind, lit, pos)
    }

    fn read_int(&mut self, pos: Pos) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        Token::new(TokenKind::Int, &self.src[start..self.pos], pos)
    }

    fn read_ident(&mut self, pos: Pos) -> Token {
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        Token::new(TokenKind::Ident, &self.src[start..self.pos], pos)
    }

    /// Double-quoted string literal; `pos` is the opening quote, which is
    /// also where an unterminated literal is reported.
    fn read_string(&mut self, pos: Pos) -> Result<Token, ParseError> {
        self.pos += 1; // opening quote
        let mut lit = String::new();
        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                return Err(ParseError {
                    pos,
                    message: "string literal not terminated".to_owned(),
                });
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => return Ok(Token::new(TokenKind::String, lit, pos)),
                '\\' => {
                    let Some(esc) = self.src[self.pos..].chars().next() else {
                        return Err(ParseError {
                            pos,
                            message: "string literal not terminated".to_owned(),
                        });
                    };
                    self.pos += esc.len_utf8();
                    match esc {
                        'n' => lit.push('\n'),
                        't' => lit.push('\t'),
                        other => lit.push(other), // covers \" and \\
                    }
                }
                other => lit.push(other),
            }
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn scan(src: &str) -> (Vec<Token>, Vec<ParseError>) {
        Lexer::new(src).tokenize()
    }

    fn kinds_and_positions(tokens: &[Token]) -> Vec<(TokenKind, Pos)> {
        tokens.iter().map(|t| (t.kind, t.pos)).collect()
    }

    #[test]
    fn literal_run_is_one_token() {
        let (tokens, errors) = scan("only string");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::String, "only string", 1),
                Token::new(TokenKind::Eof, "", 12),
            ],
        );
    }

    #[test]
    fn empty_source_is_just_eof() {
        let (tokens, errors) = scan("");
        assert!(errors.is_empty());
        assert_eq!(tokens, vec![Token::new(TokenKind::Eof, "", 1)]);
    }

    #[test]
    fn parameter_tokens() {
        let (tokens, errors) = scan("{{test}}");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::Ldbrace, "{{", 1),
                Token::new(TokenKind::Ident, "test", 3),
                Token::new(TokenKind::Rdbrace, "}}", 7),
                Token::new(TokenKind::Eof, "", 9),
            ],
        );
    }

    #[test]
    fn mixed_segments() {
        let (tokens, errors) = scan("prefix-{{test}}-suffix");
        assert!(errors.is_empty());
        assert_eq!(
            kinds_and_positions(&tokens),
            vec![
                (TokenKind::String, 1),
                (TokenKind::Ldbrace, 8),
                (TokenKind::Ident, 10),
                (TokenKind::Rdbrace, 14),
                (TokenKind::String, 16),
                (TokenKind::Eof, 23),
            ],
        );
        assert_eq!(tokens[0].lit, "prefix-");
        assert_eq!(tokens[4].lit, "-suffix");
    }

    #[test]
    fn index_and_call_punctuation() {
        let (tokens, errors) = scan("{{test[0](1,2)}}");
        assert!(errors.is_empty());
        assert_eq!(
            kinds_and_positions(&tokens),
            vec![
                (TokenKind::Ldbrace, 1),
                (TokenKind::Ident, 3),
                (TokenKind::Lbrack, 7),
                (TokenKind::Int, 8),
                (TokenKind::Rbrack, 9),
                (TokenKind::Lparen, 10),
                (TokenKind::Int, 11),
                (TokenKind::Comma, 12),
                (TokenKind::Int, 13),
                (TokenKind::Rparen, 14),
                (TokenKind::Rdbrace, 15),
                (TokenKind::Eof, 17),
            ],
        );
    }

    #[test]
    fn whitespace_inside_parameter_spans_lines() {
        let (tokens, errors) = scan("{{ a\n+\tb }}");
        assert!(errors.is_empty());
        assert_eq!(
            kinds_and_positions(&tokens),
            vec![
                (TokenKind::Ldbrace, 1),
                (TokenKind::Ident, 4),
                (TokenKind::Add, 6),
                (TokenKind::Ident, 8),
                (TokenKind::Rdbrace, 10),
                (TokenKind::Eof, 12),
            ],
        );
    }

    #[test]
    fn string_escapes_decode() {
        let (tokens, errors) = scan(r#"{{"a\"b\\c\nd\te"}}"#);
        assert!(errors.is_empty());
        assert_eq!(tokens[1].kind, TokenKind::String);
        assert_eq!(tokens[1].pos, 3);
        assert_eq!(tokens[1].lit, "a\"b\\c\nd\te");
    }

    #[test]
    fn unterminated_string_reported_at_opening_quote() {
        let (tokens, errors) = scan(r#"{{"abc"#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pos, 3);
        assert_eq!(errors[0].message, "string literal not terminated");
        // The scan still terminates with EOF.
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn invalid_character_skipped_and_reported() {
        let (tokens, errors) = scan("{{ % }}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pos, 4);
        assert_eq!(errors[0].message, "invalid character '%'");
        assert_eq!(
            kinds_and_positions(&tokens),
            vec![
                (TokenKind::Ldbrace, 1),
                (TokenKind::Rdbrace, 6),
                (TokenKind::Eof, 8),
            ],
        );
    }

    #[test]
    fn rdbrace_outside_parameter_is_literal_text() {
        let (tokens, errors) = scan("a}}b");
        assert!(errors.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::new(TokenKind::String, "a}}b", 1),
                Token::new(TokenKind::Eof, "", 5),
            ],
        );
    }

    #[test]
    fn eof_inside_parameter() {
        let (tokens, errors) = scan("{{ test");
        assert!(errors.is_empty());
        assert_eq!(
            kinds_and_positions(&tokens),
            vec![
                (TokenKind::Ldbrace, 1),
                (TokenKind::Ident, 4),
                (TokenKind::Eof, 8),
            ],
        );
    }

    #[test]
    fn multibyte_literal_text() {
        let (tokens, errors) = scan("héllo {{x}}");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].lit, "héllo ");
        // é is two bytes, so `{{` starts at byte 8.
        assert_eq!(tokens[1].pos, 8);
    }

    proptest! {
        #[test]
        fn positions_increase_and_stay_in_bounds(src in "\\PC*") {
            let (tokens, _) = Lexer::new(&src).tokenize();
            let mut last = 0;
            for tok in &tokens {
                prop_assert!(tok.pos > last);
                prop_assert!(tok.pos <= src.len() + 1);
                last = tok.pos;
            }
        }
    }
}
