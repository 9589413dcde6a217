//! The engine's expression grammar: literals, dotted paths, map literals.

use crate::scope::{Scope, Value};
use crate::{EngineError, EngineResult};
use smol_str::SmolStr;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    /// A literal value (string, number, bool, null).
    Lit(Value),
    /// A dotted variable path (`user.name`).
    Var(Vec<SmolStr>),
    /// A brace map literal (`{key: expr, ...}`).
    Map(Vec<(SmolStr, Expr)>),
}

impl Expr {
    /// Evaluate against a scope. Unknown variables and missing path segments
    /// evaluate to `null` rather than erroring.
    pub fn eval(&self, scope: &Scope) -> Value {
        match self {
            Expr::Lit(value) => value.clone(),
            Expr::Var(path) => {
                let mut current = match scope.get(&path[0]) {
                    Some(v) => v,
                    None => return Value::Null,
                };
                for segment in &path[1..] {
                    match current.get(segment.as_str()) {
                        Some(v) => current = v,
                        None => return Value::Null,
                    }
                }
                current.clone()
            }
            Expr::Map(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, expr) in entries {
                    map.insert(key.to_string(), expr.eval(scope));
                }
                Value::Object(map)
            }
        }
    }
}

/// Parse a complete expression; trailing input is an error.
pub fn parse_expr(source: &str, base_offset: usize) -> EngineResult<Expr> {
    let mut parser = ExprParser::new(source, base_offset);
    let expr = parser.parse_expr()?;
    parser.skip_whitespace();
    if !parser.is_eof() {
        return Err(EngineError::parse(
            format!("unexpected trailing input `{}`", parser.remaining().trim()),
            parser.offset(),
        ));
    }
    Ok(expr)
}

/// Cursor-based expression parser.
pub(crate) struct ExprParser<'a> {
    source: &'a str,
    pos: usize,
    /// Byte offset of `source` within the enclosing template, for errors.
    base_offset: usize,
}

impl<'a> ExprParser<'a> {
    pub(crate) fn new(source: &'a str, base_offset: usize) -> Self {
        Self {
            source,
            pos: 0,
            base_offset,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.base_offset + self.pos
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn consume(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.advance();
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    pub(crate) fn parse_expr(&mut self) -> EngineResult<Expr> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') | Some('"') => self.parse_string().map(|s| Expr::Lit(Value::String(s))),
            Some('{') => self.parse_map(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_path_or_keyword(),
            Some(c) => Err(EngineError::parse(
                format!("unexpected character `{c}` in expression"),
                self.offset(),
            )),
            None => Err(EngineError::parse("empty expression", self.offset())),
        }
    }

    fn parse_string(&mut self) -> EngineResult<String> {
        let quote = self.advance().unwrap();
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('\\') => match self.advance() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => {
                        return Err(EngineError::parse("unterminated string", self.offset()))
                    }
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(EngineError::parse("unterminated string", self.offset())),
            }
        }
    }

    fn parse_number(&mut self) -> EngineResult<Expr> {
        let start_offset = self.offset();
        let text = self.read_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
        let value: Value = text.parse::<f64>().ok().and_then(|f| {
            if text.contains('.') {
                serde_json::Number::from_f64(f).map(Value::Number)
            } else {
                text.parse::<i64>().ok().map(Value::from)
            }
        })
        .ok_or_else(|| EngineError::parse(format!("invalid number `{text}`"), start_offset))?;
        Ok(Expr::Lit(value))
    }

    fn parse_path_or_keyword(&mut self) -> EngineResult<Expr> {
        let mut segments = vec![SmolStr::from(self.parse_ident()?)];
        while self.peek() == Some('.') {
            self.advance();
            segments.push(SmolStr::from(self.parse_ident()?));
        }
        if segments.len() == 1 {
            match segments[0].as_str() {
                "true" => return Ok(Expr::Lit(Value::Bool(true))),
                "false" => return Ok(Expr::Lit(Value::Bool(false))),
                "null" => return Ok(Expr::Lit(Value::Null)),
                _ => {}
            }
        }
        Ok(Expr::Var(segments))
    }

    fn parse_ident(&mut self) -> EngineResult<&'a str> {
        let ident = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(EngineError::parse("expected identifier", self.offset()));
        }
        Ok(ident)
    }

    fn parse_map(&mut self) -> EngineResult<Expr> {
        self.advance(); // '{'
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.consume('}') {
                return Ok(Expr::Map(entries));
            }
            let key = match self.peek() {
                Some('\'') | Some('"') => SmolStr::from(self.parse_string()?),
                _ => SmolStr::from(self.parse_ident()?),
            };
            self.skip_whitespace();
            if !self.consume(':') {
                return Err(EngineError::parse(
                    format!("expected `:` after map key `{key}`"),
                    self.offset(),
                ));
            }
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_whitespace();
            if !self.consume(',') {
                self.skip_whitespace();
                if self.consume('}') {
                    return Ok(Expr::Map(entries));
                }
                return Err(EngineError::parse(
                    "expected `,` or `}` in map literal",
                    self.offset(),
                ));
            }
        }
    }
}
