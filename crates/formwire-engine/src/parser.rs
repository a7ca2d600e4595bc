//! Precedence-climbing parser producing an [`Expr`] tree.
//!
//! Lowest to highest binding: `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, prefix `! - +`, postfix calls / `.name` /
//! `[index]`. A method call `x.f(a)` is sugar for `f(x, a)`.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind, tokenize};

/// Parses a complete formula.
pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(SyntaxError::new(
            trailing.offset,
            format!("unexpected {}", trailing.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::NotEq, 3),
        TokenKind::EqEqEq => (BinaryOp::StrictEq, 3),
        TokenKind::NotEqEq => (BinaryOp::StrictNotEq, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::Le => (BinaryOp::Le, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::Ge => (BinaryOp::Ge, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some(op)
}

impl Parser {
    fn peek(&self) -> &Token {
        // `tokenize` always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, SyntaxError> {
        let token = self.peek().clone();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                token.offset,
                format!("expected {what}, found {}", token.kind.describe()),
            ))
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        let cond = self.binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = binary_op(&self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.advance();
                    let name = match token.kind {
                        TokenKind::Ident(name) => name,
                        other => {
                            return Err(SyntaxError::new(
                                token.offset,
                                format!("expected property name, found {}", other.describe()),
                            ));
                        }
                    };
                    if self.peek().kind == TokenKind::LParen {
                        self.advance();
                        let mut args = vec![expr];
                        args.extend(self.arguments()?);
                        expr = Expr::Call { name, args };
                    } else {
                        expr = Expr::Member(Box::new(expr), name);
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                TokenKind::LParen => {
                    let offset = self.peek().offset;
                    let Expr::Ident(name) = expr else {
                        return Err(SyntaxError::new(
                            offset,
                            "only named functions can be called",
                        ));
                    };
                    self.advance();
                    let args = self.arguments()?;
                    expr = Expr::Call { name, args };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parses a comma-separated argument list; the `(` is already consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.list(TokenKind::RParen, "')'")
    }

    fn list(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(close.clone(), what)?;
            return Ok(items);
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::Number(n) => Expr::Literal(n.into()),
            TokenKind::Str(s) => Expr::Literal(s.into()),
            TokenKind::True => Expr::Literal(true.into()),
            TokenKind::False => Expr::Literal(false.into()),
            TokenKind::Null => Expr::Literal(formwire_core::Value::Null),
            TokenKind::Regex { source, flags } => Expr::Regex { source, flags },
            TokenKind::Ident(name) => Expr::Ident(name),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                inner
            }
            TokenKind::LBracket => Expr::Array(self.list(TokenKind::RBracket, "']'")?),
            other => {
                return Err(SyntaxError::new(
                    token.offset,
                    format!("unexpected {}", other.describe()),
                ));
            }
        };
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(source: &str) -> String {
        parse(source).unwrap().to_string()
    }

    #[test]
    fn precedence() {
        assert_eq!(render("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(render("a || b && c"), "(a || (b && c))");
        assert_eq!(render("a == b < c"), "(a == (b < c))");
        assert_eq!(render("-a * b"), "(-a * b)");
        assert_eq!(render("1 - 2 - 3"), "((1 - 2) - 3)");
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(render("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
        assert_eq!(render("x > 1 ? 'big' : 'small'"), "((x > 1) ? \"big\" : \"small\")");
    }

    #[test]
    fn member_index_and_calls() {
        assert_eq!(render("claims[0].amount"), "claims[0].amount");
        assert_eq!(render("sum(a, b[1])"), "sum(a, b[1])");
        assert_eq!(render("name.trim()"), "trim(name)");
        assert_eq!(render("name.substring(0, 2)"), "substring(name, 0, 2)");
        assert_eq!(render("[1, 'a', []]"), "[1, \"a\", []]");
    }

    #[test]
    fn regex_literal_argument() {
        let expr = parse("matches(code, /^\\d+$/)").unwrap();
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(
            args[1],
            Expr::Regex {
                source: "^\\d+$".into(),
                flags: String::new(),
            }
        );
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse("1 +").unwrap_err().offset, 3);
        assert!(parse("(a").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("(a)(b)").is_err());
        assert!(parse("a ? b").is_err());
        assert!(parse("f(a,)").is_err());
    }
}
