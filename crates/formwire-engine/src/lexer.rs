//! Formula tokenizer.
//!
//! `/` is ambiguous between division and the start of a regex literal. The
//! tokenizer settles it from the previous token: after something that ends
//! a value (a literal, an identifier, `)` or `]`) it is division, otherwise
//! a regex.

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Regex { source: String, flags: String },
    Ident(String),
    True,
    False,
    Null,

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

impl TokenKind {
    /// Returns `true` if an operator (rather than a value) may follow.
    fn ends_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::Regex { .. }
                | TokenKind::Ident(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Regex { source, flags } => format!("regex /{source}/{flags}"),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::EqEqEq => "===",
            TokenKind::NotEqEq => "!==",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub offset: usize,
}

/// Tokenizes `source`. The result always ends with [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.src.len())
    }

    fn value_expected(&self) -> bool {
        self.tokens.last().is_none_or(|t| !t.kind.ends_value())
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.tokens.push(Token { kind, offset });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(ch) = self.peek() {
            let start = self.offset();
            if ch.is_whitespace() {
                self.pos += 1;
                continue;
            }

            if ch.is_ascii_digit()
                || (ch == '.'
                    && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                    && self.value_expected())
            {
                let number = self.number()?;
                self.push(TokenKind::Number(number), start);
                continue;
            }

            if ch == '_' || ch == '$' || ch.is_alphabetic() {
                let word = self.word();
                let kind = match word.as_str() {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" | "undefined" => TokenKind::Null,
                    "NaN" => TokenKind::Number(f64::NAN),
                    "Infinity" => TokenKind::Number(f64::INFINITY),
                    _ => TokenKind::Ident(word),
                };
                self.push(kind, start);
                continue;
            }

            if ch == '\'' || ch == '"' {
                let text = self.string(ch)?;
                self.push(TokenKind::Str(text), start);
                continue;
            }

            if ch == '/' && self.value_expected() {
                let (source, flags) = self.regex()?;
                self.push(TokenKind::Regex { source, flags }, start);
                continue;
            }

            let kind = self.operator(ch, start)?;
            self.push(kind, start);
        }

        let end = self.src.len();
        self.push(TokenKind::Eof, end);
        Ok(self.tokens)
    }

    fn word(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c == '$' || c.is_alphanumeric() {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn number(&mut self) -> Result<f64, SyntaxError> {
        let start = self.offset();
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.'
                && !seen_dot
                && self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
            {
                seen_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.pos += 1;
        }

        // Exponent: only consumed when digits follow.
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    if let Some(c) = self.peek() {
                        text.push(c);
                    }
                    self.pos += 1;
                }
                while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }

        text.parse()
            .map_err(|_| SyntaxError::new(start, format!("invalid number '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.offset();
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(start, "unterminated string literal"));
            };
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let Some(escaped) = self.peek() else {
                return Err(SyntaxError::new(start, "unterminated string literal"));
            };
            self.pos += 1;
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{0008}'),
                'f' => out.push('\u{000C}'),
                'v' => out.push('\u{000B}'),
                '0' => out.push('\0'),
                'u' => out.push(self.unicode_escape()?),
                // Unknown escapes keep the character: `\'`, `\"`, `\\`, `\/`.
                other => out.push(other),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        let start = self.offset();
        let mut hex = String::with_capacity(4);
        for _ in 0..4 {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.pos += 1;
                }
                _ => return Err(SyntaxError::new(start, "invalid \\u escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new(start, format!("invalid \\u{hex} escape")))
    }

    fn regex(&mut self) -> Result<(String, String), SyntaxError> {
        let start = self.offset();
        self.pos += 1;
        let mut source = String::new();
        let mut in_class = false;
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(start, "unterminated regex literal"));
            };
            self.pos += 1;
            match c {
                '\\' => {
                    source.push(c);
                    if let Some(next) = self.peek() {
                        source.push(next);
                        self.pos += 1;
                    }
                }
                '[' => {
                    in_class = true;
                    source.push(c);
                }
                ']' => {
                    in_class = false;
                    source.push(c);
                }
                '/' if !in_class => break,
                _ => source.push(c),
            }
        }
        let mut flags = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_ascii_alphabetic()) {
            flags.push(c);
            self.pos += 1;
        }
        Ok((source, flags))
    }

    fn operator(&mut self, ch: char, start: usize) -> Result<TokenKind, SyntaxError> {
        let next = self.peek_at(1);
        let third = self.peek_at(2);
        let (kind, width) = match (ch, next, third) {
            ('=', Some('='), Some('=')) => (TokenKind::EqEqEq, 3),
            ('!', Some('='), Some('=')) => (TokenKind::NotEqEq, 3),
            ('=', Some('='), _) => (TokenKind::EqEq, 2),
            ('!', Some('='), _) => (TokenKind::NotEq, 2),
            ('<', Some('='), _) => (TokenKind::Le, 2),
            ('>', Some('='), _) => (TokenKind::Ge, 2),
            ('&', Some('&'), _) => (TokenKind::AndAnd, 2),
            ('|', Some('|'), _) => (TokenKind::OrOr, 2),
            ('(', ..) => (TokenKind::LParen, 1),
            (')', ..) => (TokenKind::RParen, 1),
            ('[', ..) => (TokenKind::LBracket, 1),
            (']', ..) => (TokenKind::RBracket, 1),
            (',', ..) => (TokenKind::Comma, 1),
            ('.', ..) => (TokenKind::Dot, 1),
            ('?', ..) => (TokenKind::Question, 1),
            (':', ..) => (TokenKind::Colon, 1),
            ('+', ..) => (TokenKind::Plus, 1),
            ('-', ..) => (TokenKind::Minus, 1),
            ('*', ..) => (TokenKind::Star, 1),
            ('/', ..) => (TokenKind::Slash, 1),
            ('%', ..) => (TokenKind::Percent, 1),
            ('!', ..) => (TokenKind::Bang, 1),
            ('<', ..) => (TokenKind::Lt, 1),
            ('>', ..) => (TokenKind::Gt, 1),
            _ => {
                return Err(SyntaxError::new(
                    start,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };
        self.pos += width;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != TokenKind::Eof)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            kinds("a.b[2] >= 1.5 && !x === 'y'"),
            vec![
                ident("a"),
                TokenKind::Dot,
                ident("b"),
                TokenKind::LBracket,
                TokenKind::Number(2.0),
                TokenKind::RBracket,
                TokenKind::Ge,
                TokenKind::Number(1.5),
                TokenKind::AndAnd,
                TokenKind::Bang,
                ident("x"),
                TokenKind::EqEqEq,
                TokenKind::Str("y".into()),
            ]
        );
    }

    #[test]
    fn slash_after_value_is_division() {
        assert_eq!(
            kinds("total / 2"),
            vec![ident("total"), TokenKind::Slash, TokenKind::Number(2.0)]
        );
        assert_eq!(
            kinds("(a) / b"),
            vec![
                TokenKind::LParen,
                ident("a"),
                TokenKind::RParen,
                TokenKind::Slash,
                ident("b"),
            ]
        );
    }

    #[test]
    fn slash_after_operator_is_regex() {
        assert_eq!(
            kinds("matches(code, /^[a/z]+$/i)"),
            vec![
                ident("matches"),
                TokenKind::LParen,
                ident("code"),
                TokenKind::Comma,
                TokenKind::Regex {
                    source: "^[a/z]+$".into(),
                    flags: "i".into(),
                },
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b" 'tab\there' 'é'"#),
            vec![
                TokenKind::Str("it's".into()),
                TokenKind::Str("a\"b".into()),
                TokenKind::Str("tab\there".into()),
                TokenKind::Str("é".into()),
            ]
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(
            kinds("true false null undefined"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::Null,
            ]
        );
    }

    #[test]
    fn numbers_with_exponent_and_leading_dot() {
        assert_eq!(
            kinds("1e3 + .5 - 2E-1"),
            vec![
                TokenKind::Number(1000.0),
                TokenKind::Plus,
                TokenKind::Number(0.5),
                TokenKind::Minus,
                TokenKind::Number(0.2),
            ]
        );
    }

    #[test]
    fn errors_carry_offsets() {
        let err = tokenize("a + 'open").unwrap_err();
        assert_eq!(err.offset, 4);
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.offset, 2);
        assert!(tokenize("x = 1").is_err());
    }
}
