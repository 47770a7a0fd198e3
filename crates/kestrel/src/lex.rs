//! Tokeniser for kestrel source text.
//!
//! The surface syntax is ASCII: decimal integer literals, identifiers,
//! the keywords `letrec`/`in`/`if`, single- and two-character operators,
//! and `//` line comments. Two-character operators are matched greedily
//! by dispatching on the first character. Every token carries its source
//! position; the first unrecognised character aborts the lex.

use std::fmt;

use crate::{parse::ParseError, symbol::Symbol};

/// A source-code location: file, 1-based line, 1-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourcePos {
    pub file: Symbol,
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    #[must_use]
    pub fn new(file: Symbol, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// One lexeme, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Int(i64),
    Ident(Symbol),
    Letrec,
    In,
    If,
    Plus,
    Minus,
    Star,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Backslash,
    Arrow,
    LParen,
    RParen,
    Semi,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int(_) => return f.write_str("integer literal"),
            Self::Ident(sym) => return write!(f, "identifier '{sym}'"),
            Self::Letrec => "'letrec'",
            Self::In => "'in'",
            Self::If => "'if'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Assign => "'='",
            Self::Eq => "'=='",
            Self::Ne => "'!='",
            Self::Lt => "'<'",
            Self::Le => "'<='",
            Self::Gt => "'>'",
            Self::Ge => "'>='",
            Self::Backslash => "'\\'",
            Self::Arrow => "'->'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Semi => "';'",
            Self::Eof => "end of input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

/// Tokenises a whole source buffer. Fails on the first lexical error.
///
/// The returned stream always ends with a single [`TokenKind::Eof`] token
/// carrying the position just past the end of input.
pub(crate) fn tokenize(source: &str, file: Symbol) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        src: source.as_bytes(),
        i: 0,
        line: 1,
        column: 1,
        file,
    };
    lexer.run()
}

struct Lexer<'a> {
    src: &'a [u8],
    i: usize,
    line: u32,
    column: u32,
    file: Symbol,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let pos = self.pos();
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                });
                return Ok(tokens);
            };
            let kind = match ch {
                b'0'..=b'9' => self.lex_int(pos)?,
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.lex_ident(),
                _ => self.lex_operator(pos)?,
            };
            tokens.push(Token { kind, pos });
        }
    }

    /// Skips whitespace and `//` line comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') => {
                    if self.peek_at(1) == Some(b'/') {
                        while !matches!(self.peek(), None | Some(b'\n')) {
                            self.bump();
                        }
                    } else {
                        let pos = self.pos();
                        return Err(ParseError::syntax("unrecognised character '/'", pos));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_int(&mut self, pos: SourcePos) -> Result<TokenKind, ParseError> {
        let start = self.i;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.i]).expect("digits are ASCII");
        let value: i64 = text
            .parse()
            .map_err(|_| ParseError::syntax(format!("integer literal '{text}' out of range"), pos))?;
        Ok(TokenKind::Int(value))
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.i;
        while matches!(self.peek(), Some(b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.i]).expect("identifier chars are ASCII");
        match text {
            "letrec" => TokenKind::Letrec,
            "in" => TokenKind::In,
            "if" => TokenKind::If,
            _ => TokenKind::Ident(Symbol::intern(text)),
        }
    }

    /// Single- and two-character operators, dispatched on the first
    /// character; the two-character forms match greedily.
    fn lex_operator(&mut self, pos: SourcePos) -> Result<TokenKind, ParseError> {
        let ch = self.bump().expect("caller checked peek");
        let kind = match ch {
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b';' => TokenKind::Semi,
            b'\\' => TokenKind::Backslash,
            b'-' => {
                if self.eat(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'=' => {
                if self.eat(b'=') {
                    TokenKind::Eq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    TokenKind::Ne
                } else {
                    return Err(ParseError::syntax("unrecognised character '!'", pos));
                }
            }
            b'<' => {
                if self.eat(b'=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.eat(b'=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            other => {
                let shown: String = if other.is_ascii_graphic() {
                    char::from(other).to_string()
                } else {
                    format!("\\x{other:02x}")
                };
                return Err(ParseError::syntax(format!("unrecognised character '{shown}'"), pos));
            }
        };
        Ok(kind)
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.file, self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.i).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.i + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.i += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, Symbol::intern("test.ks"))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn two_char_operators_match_greedily() {
        assert_eq!(
            kinds("== = != <= < >= > ->"),
            vec![
                TokenKind::Eq,
                TokenKind::Assign,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::Ge,
                TokenKind::Gt,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lambda_and_keywords() {
        let x = Symbol::intern("x");
        assert_eq!(
            kinds("letrec x = 1 in \\x -> x"),
            vec![
                TokenKind::Letrec,
                TokenKind::Ident(x),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::In,
                TokenKind::Backslash,
                TokenKind::Ident(x),
                TokenKind::Arrow,
                TokenKind::Ident(x),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(
            kinds("1 // the rest is ignored ;;;\n2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = tokenize("10\n  x", Symbol::intern("pos.ks")).unwrap();
        assert_eq!((tokens[0].pos.line, tokens[0].pos.column), (1, 1));
        assert_eq!((tokens[1].pos.line, tokens[1].pos.column), (2, 3));
    }

    #[test]
    fn bad_character_is_fatal() {
        let err = tokenize("1 ? 2", Symbol::intern("bad.ks")).unwrap_err();
        assert!(err.to_string().contains("unrecognised character '?'"), "{err}");
    }

    #[test]
    fn bare_bang_is_fatal() {
        assert!(tokenize("1 ! 2", Symbol::intern("bad.ks")).is_err());
    }

    #[test]
    fn out_of_range_integer_is_fatal() {
        let err = tokenize("9223372036854775808", Symbol::intern("bad.ks")).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn in_range_integer_parses() {
        assert_eq!(kinds("9223372036854775807"), vec![TokenKind::Int(i64::MAX), TokenKind::Eof]);
    }
}
