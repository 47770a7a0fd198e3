//! Parser: token stream to top-level AST forms.
//!
//! Recursive descent over the precedence ladder, lowest binding first:
//! comparisons, then `+`/`-`, then `*`, then application by juxtaposition.
//! Lambda (`\x y -> E`) and `letrec … in E` are prefix forms whose body
//! extends maximally to the right; `if` is a prefix form taking three
//! atom-level operands. The first lexical or grammatical failure aborts
//! the parse; there is no recovery.

use std::{borrow::Cow, fmt};

use crate::{
    ast::Ast,
    builtins::BuiltinOp,
    lex::{SourcePos, Token, TokenKind, tokenize},
    symbol::Symbol,
};

/// A lexical or grammatical failure, positioned at the offending token.
#[derive(Debug, Clone)]
pub struct ParseError {
    msg: Cow<'static, str>,
    pos: SourcePos,
}

impl ParseError {
    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, pos: SourcePos) -> Self {
        Self { msg: msg.into(), pos }
    }

    /// The source position of the failure.
    #[must_use]
    pub fn pos(&self) -> SourcePos {
        self.pos
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.msg)
    }
}

impl std::error::Error for ParseError {}

/// Parses a whole program into its top-level forms.
///
/// A program is a `;`-separated sequence of forms; each form is either a
/// binding `ident = expr` or a bare expression. A trailing `;` is
/// permitted.
pub fn parse(source: &str, file_name: &str) -> Result<Vec<Ast>, ParseError> {
    let file = Symbol::intern(file_name);
    let tokens = tokenize(source, file)?;
    Parser { tokens, i: 0 }.program()
}

struct Parser {
    tokens: Vec<Token>,
    i: usize,
}

impl Parser {
    fn program(mut self) -> Result<Vec<Ast>, ParseError> {
        let mut forms = Vec::new();
        loop {
            while self.eat(TokenKind::Semi) {}
            if self.at().kind == TokenKind::Eof {
                return Ok(forms);
            }
            forms.push(self.form()?);
            let next = self.at();
            if next.kind != TokenKind::Semi && next.kind != TokenKind::Eof {
                return Err(ParseError::syntax(format!("expected ';', found {}", next.kind), next.pos));
            }
        }
    }

    /// One top-level form: `ident = expr` or a bare expression.
    fn form(&mut self) -> Result<Ast, ParseError> {
        if let TokenKind::Ident(sym) = self.at().kind
            && self.tokens.get(self.i + 1).map(|t| t.kind) == Some(TokenKind::Assign)
        {
            let pos = self.at().pos;
            self.advance();
            self.advance();
            let expr = self.expr()?;
            return Ok(Ast::Assign {
                pos,
                sym,
                expr: Box::new(expr),
            });
        }
        self.expr()
    }

    fn expr(&mut self) -> Result<Ast, ParseError> {
        match self.at().kind {
            TokenKind::Backslash => self.lambda(),
            TokenKind::Letrec => self.letrec(),
            _ => self.comparison(),
        }
    }

    /// `\x y z -> E` desugars to nested single-argument lambdas.
    fn lambda(&mut self) -> Result<Ast, ParseError> {
        let pos = self.advance().pos;
        let mut args = vec![self.expect_ident()?];
        while let TokenKind::Ident(sym) = self.at().kind {
            self.advance();
            args.push(sym);
        }
        self.expect(TokenKind::Arrow)?;
        let body = self.expr()?;
        Ok(args.into_iter().rev().fold(body, |body, arg| Ast::Lambda {
            pos,
            arg,
            body: Box::new(body),
        }))
    }

    /// `letrec b1; b2; … in E` — one mutually recursive binding group.
    fn letrec(&mut self) -> Result<Ast, ParseError> {
        let pos = self.advance().pos;
        let mut bindings = Vec::new();
        loop {
            let sym = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            let expr = self.expr()?;
            bindings.push((sym, expr));
            if !self.eat(TokenKind::Semi) || self.at().kind == TokenKind::In {
                break;
            }
        }
        self.expect(TokenKind::In)?;
        let body = self.expr()?;
        Ok(Ast::Letrec {
            pos,
            bindings,
            body: Box::new(body),
        })
    }

    fn comparison(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.at().kind {
                TokenKind::Eq => BuiltinOp::Eq,
                TokenKind::Ne => BuiltinOp::Ne,
                TokenKind::Lt => BuiltinOp::Lt,
                TokenKind::Le => BuiltinOp::Le,
                TokenKind::Gt => BuiltinOp::Gt,
                TokenKind::Ge => BuiltinOp::Ge,
                _ => return Ok(lhs),
            };
            let pos = self.advance().pos;
            let rhs = self.additive()?;
            lhs = Ast::ApplyBuiltin {
                pos,
                op,
                args: vec![lhs, rhs],
            };
        }
    }

    fn additive(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.at().kind {
                TokenKind::Plus => BuiltinOp::Add,
                TokenKind::Minus => BuiltinOp::Sub,
                _ => return Ok(lhs),
            };
            let pos = self.advance().pos;
            let rhs = self.multiplicative()?;
            lhs = Ast::ApplyBuiltin {
                pos,
                op,
                args: vec![lhs, rhs],
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Ast, ParseError> {
        let mut lhs = self.application()?;
        while self.at().kind == TokenKind::Star {
            let pos = self.advance().pos;
            let rhs = self.application()?;
            lhs = Ast::ApplyBuiltin {
                pos,
                op: BuiltinOp::Mul,
                args: vec![lhs, rhs],
            };
        }
        Ok(lhs)
    }

    /// Left-associative juxtaposition: `f x y` is `((f x) y)`.
    fn application(&mut self) -> Result<Ast, ParseError> {
        let mut head = self.atom()?;
        while self.at_atom_start() {
            let tail = self.atom()?;
            let pos = head.pos();
            head = Ast::Apply {
                pos,
                head: Box::new(head),
                tail: Box::new(tail),
            };
        }
        Ok(head)
    }

    fn at_atom_start(&self) -> bool {
        matches!(
            self.at().kind,
            TokenKind::Int(_) | TokenKind::Ident(_) | TokenKind::LParen | TokenKind::If
        )
    }

    fn atom(&mut self) -> Result<Ast, ParseError> {
        let token = self.at();
        match token.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Ast::Const {
                    pos: token.pos,
                    value: value.into(),
                })
            }
            TokenKind::Ident(sym) => {
                self.advance();
                Ok(Ast::Var { pos: token.pos, sym })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::If => {
                self.advance();
                let cond = self.atom()?;
                let then = self.atom()?;
                let els = self.atom()?;
                Ok(Ast::If {
                    pos: token.pos,
                    cond: Box::new(cond),
                    then: Box::new(then),
                    els: Box::new(els),
                })
            }
            kind => Err(ParseError::syntax(format!("expected expression, found {kind}"), token.pos)),
        }
    }

    fn at(&self) -> Token {
        self.tokens[self.i]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.i];
        if token.kind != TokenKind::Eof {
            self.i += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.at();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::syntax(format!("expected {kind}, found {}", token.kind), token.pos))
        }
    }

    fn expect_ident(&mut self) -> Result<Symbol, ParseError> {
        let token = self.at();
        if let TokenKind::Ident(sym) = token.kind {
            self.advance();
            Ok(sym)
        } else {
            Err(ParseError::syntax(
                format!("expected identifier, found {}", token.kind),
                token.pos,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Literal;

    fn parse_one(source: &str) -> Ast {
        let mut forms = parse(source, "test.ks").unwrap();
        assert_eq!(forms.len(), 1, "{source}");
        forms.pop().unwrap()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let ast = parse_one("1+2*3");
        let Ast::ApplyBuiltin { op: BuiltinOp::Add, args, .. } = ast else {
            panic!("expected addition at the root");
        };
        assert!(matches!(&args[1], Ast::ApplyBuiltin { op: BuiltinOp::Mul, .. }));
    }

    #[test]
    fn comparison_binds_loosest() {
        let ast = parse_one("1+2 == 3*1");
        let Ast::ApplyBuiltin { op: BuiltinOp::Eq, args, .. } = ast else {
            panic!("expected comparison at the root");
        };
        assert!(matches!(&args[0], Ast::ApplyBuiltin { op: BuiltinOp::Add, .. }));
        assert!(matches!(&args[1], Ast::ApplyBuiltin { op: BuiltinOp::Mul, .. }));
    }

    #[test]
    fn application_is_left_associative() {
        let ast = parse_one("f x y");
        let Ast::Apply { head, .. } = &ast else {
            panic!("expected application");
        };
        assert!(matches!(**head, Ast::Apply { .. }));
    }

    #[test]
    fn application_binds_tighter_than_star() {
        let ast = parse_one("f x * g y");
        assert!(matches!(ast, Ast::ApplyBuiltin { op: BuiltinOp::Mul, .. }));
    }

    #[test]
    fn multi_argument_lambda_desugars() {
        let ast = parse_one(r"\x y z -> x");
        let Ast::Lambda { body, .. } = ast else {
            panic!("expected lambda");
        };
        let Ast::Lambda { body, .. } = *body else {
            panic!("expected nested lambda");
        };
        assert!(matches!(*body, Ast::Lambda { .. }));
    }

    #[test]
    fn lambda_body_extends_right() {
        // The body is x+1, not x.
        let ast = parse_one(r"\x -> x+1");
        let Ast::Lambda { body, .. } = ast else {
            panic!("expected lambda");
        };
        assert!(matches!(*body, Ast::ApplyBuiltin { op: BuiltinOp::Add, .. }));
    }

    #[test]
    fn letrec_collects_one_group() {
        let ast = parse_one("letrec x = 10; y = x+1 in x*y");
        let Ast::Letrec { bindings, .. } = ast else {
            panic!("expected letrec");
        };
        let names: Vec<&str> = bindings.iter().map(|(sym, _)| sym.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
    }

    #[test]
    fn if_is_prefix_over_atoms() {
        let ast = parse_one("if (10==10) 1 2");
        let Ast::If { cond, then, els, .. } = ast else {
            panic!("expected conditional");
        };
        assert!(matches!(*cond, Ast::ApplyBuiltin { op: BuiltinOp::Eq, .. }));
        assert!(matches!(*then, Ast::Const { value: Literal::Int(1), .. }));
        assert!(matches!(*els, Ast::Const { value: Literal::Int(2), .. }));
    }

    #[test]
    fn top_level_assign_and_expression_forms() {
        let forms = parse("x = 10; x+x", "test.ks").unwrap();
        assert_eq!(forms.len(), 2);
        assert!(matches!(forms[0], Ast::Assign { .. }));
        assert!(matches!(forms[1], Ast::ApplyBuiltin { op: BuiltinOp::Add, .. }));
    }

    #[test]
    fn trailing_semicolon_is_permitted() {
        assert_eq!(parse("10;", "test.ks").unwrap().len(), 1);
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        // Positions shift on re-parse, so compare the rendered forms.
        for source in ["1+2*3", r"\x y -> x y", "letrec f = \\n -> n in f 10", "if x 1 2"] {
            let rendered = parse_one(source).to_string();
            assert_eq!(parse_one(&rendered).to_string(), rendered, "{source}");
        }
    }

    #[test]
    fn missing_in_is_fatal() {
        let err = parse("letrec x = 1 x", "test.ks").unwrap_err();
        assert!(err.to_string().contains("expected 'in'"), "{err}");
    }

    #[test]
    fn missing_semicolon_between_forms_is_fatal() {
        let err = parse("10 = 11", "test.ks").unwrap_err();
        assert!(err.to_string().contains("expected ';'"), "{err}");
    }

    #[test]
    fn unclosed_paren_is_fatal() {
        let err = parse("(1+2", "test.ks").unwrap_err();
        assert!(err.to_string().contains("expected ')'"), "{err}");
    }
}
