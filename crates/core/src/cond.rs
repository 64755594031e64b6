// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The condition ("IFTTT") expression language.
//!
//! A small, sandboxed boolean language evaluated against the live ticker
//! map: comparisons, `and`/`or`/`not`, numeric and string literals,
//! parentheses, and `['key']` / `.attr` access into nested maps. There are
//! no calls and no assignments in the grammar, so user expressions cannot
//! reach outside the evaluation namespace.
//!
//! ```text
//! tickers['binance']['BTC/USDT']['last'] > 29000
//! ```

use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CondError {
    #[error("parse error at byte {pos}: {msg}")]
    Parse { pos: usize, msg: String },

    #[error("undefined name '{0}'")]
    Undefined(String),

    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("type error: {0}")]
    Type(String),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Ident(String),
    Index(Box<Expr>, Box<Expr>),
    Attr(Box<Expr>, String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
}

impl Expr {
    /// Parse an expression from source text.
    pub fn parse(src: &str) -> Result<Self, CondError> {
        let tokens = lex(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.unexpected("end of expression"));
        }
        Ok(expr)
    }

    /// Evaluate against a namespace (the tickers map) and report truthiness.
    pub fn eval(&self, ns: &Value) -> Result<bool, CondError> {
        Ok(truthy(&self.eval_value(ns)?))
    }

    fn eval_value(&self, ns: &Value) -> Result<Value, CondError> {
        match self {
            Expr::Num(n) => Ok(Value::from(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Ident(name) => ns
                .get(name)
                .cloned()
                .ok_or_else(|| CondError::Undefined(name.clone())),
            Expr::Index(base, key) => {
                let base = base.eval_value(ns)?;
                let key = key.eval_value(ns)?;
                index(&base, &key)
            }
            Expr::Attr(base, name) => {
                let base = base.eval_value(ns)?;
                base.get(name)
                    .cloned()
                    .ok_or_else(|| CondError::MissingKey(name.clone()))
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval_value(ns)?))),
            Expr::And(lhs, rhs) => {
                let left = lhs.eval_value(ns)?;
                // Python-style short circuit: the operand value propagates.
                if truthy(&left) {
                    rhs.eval_value(ns)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(lhs, rhs) => {
                let left = lhs.eval_value(ns)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    rhs.eval_value(ns)
                }
            }
            Expr::Cmp(lhs, op, rhs) => {
                let left = lhs.eval_value(ns)?;
                let right = rhs.eval_value(ns)?;
                compare(&left, *op, &right).map(Value::Bool)
            }
        }
    }
}

/// Parse-and-evaluate convenience used by the condition scanner.
pub fn eval_str(src: &str, ns: &Value) -> Result<bool, CondError> {
    Expr::parse(src)?.eval(ns)
}

fn index(base: &Value, key: &Value) -> Result<Value, CondError> {
    match (base, key) {
        (Value::Object(map), Value::String(k)) => map
            .get(k)
            .cloned()
            .ok_or_else(|| CondError::MissingKey(k.clone())),
        (Value::Array(items), key) => {
            let idx = as_num(key)
                .ok_or_else(|| CondError::Type("array index must be a number".into()))?;
            items
                .get(idx as usize)
                .cloned()
                .ok_or_else(|| CondError::MissingKey(idx.to_string()))
        }
        (Value::Object(_), other) => Err(CondError::Type(format!(
            "map key must be a string, got {other}"
        ))),
        (other, _) => Err(CondError::Type(format!("cannot index into {other}"))),
    }
}

/// Numeric view of a value. Strings that parse as numbers count, since
/// tickers may carry decimals serialized as strings.
fn as_num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> Result<bool, CondError> {
    // Numeric comparison whenever both sides have a numeric view.
    if let (Some(l), Some(r)) = (as_num(left), as_num(right)) {
        return Ok(match op {
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
        });
    }
    match (left, right, op) {
        (Value::String(l), Value::String(r), CmpOp::Eq) => Ok(l == r),
        (Value::String(l), Value::String(r), CmpOp::Ne) => Ok(l != r),
        (l, r, CmpOp::Eq) => Ok(l == r),
        (l, r, CmpOp::Ne) => Ok(l != r),
        (l, r, op) => Err(CondError::Type(format!("cannot compare {l} {op} {r}"))),
    }
}

// --- lexer ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    True,
    False,
    Cmp(CmpOp),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
}

fn lex(src: &str) -> Result<Vec<Token>, CondError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' if !bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let (s, next) = lex_string(src, i, c)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            '<' | '>' | '=' | '!' => {
                let two = &src[i..(i + 2).min(src.len())];
                let (op, len) = match two {
                    "==" => (CmpOp::Eq, 2),
                    "!=" => (CmpOp::Ne, 2),
                    "<=" => (CmpOp::Le, 2),
                    ">=" => (CmpOp::Ge, 2),
                    _ if c == '<' => (CmpOp::Lt, 1),
                    _ if c == '>' => (CmpOp::Gt, 1),
                    _ => {
                        return Err(CondError::Parse {
                            pos: i,
                            msg: format!("unexpected '{c}'"),
                        })
                    }
                };
                tokens.push(Token::Cmp(op));
                i += len;
            }
            _ if c.is_ascii_digit() || c == '.' || c == '-' => {
                let start = i;
                i += 1;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit()
                        || bytes[i] == b'.'
                        || bytes[i] == b'e'
                        || bytes[i] == b'E'
                        || bytes[i] == b'_')
                {
                    i += 1;
                }
                let text = src[start..i].replace('_', "");
                let n: f64 = text.parse().map_err(|_| CondError::Parse {
                    pos: start,
                    msg: format!("bad number '{text}'"),
                })?;
                tokens.push(Token::Num(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(match &src[start..i] {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "True" | "true" => Token::True,
                    "False" | "false" => Token::False,
                    name => Token::Ident(name.to_string()),
                });
            }
            _ => {
                return Err(CondError::Parse {
                    pos: i,
                    msg: format!("unexpected '{c}'"),
                })
            }
        }
    }

    Ok(tokens)
}

fn lex_string(src: &str, start: usize, quote: char) -> Result<(String, usize), CondError> {
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((off, c)) = chars.next() {
        if c == quote {
            return Ok((out, start + 1 + off + c.len_utf8()));
        }
        if c == '\\' {
            match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    Err(CondError::Parse {
        pos: start,
        msg: "unterminated string".into(),
    })
}

// --- parser ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), CondError> {
        match self.bump() {
            Some(ref tok) if tok == expected => Ok(()),
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, what: &str) -> CondError {
        CondError::Parse {
            pos: self.pos,
            msg: format!("expected {what}"),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, CondError> {
        let mut expr = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let rhs = self.and_expr()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, CondError> {
        let mut expr = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.bump();
            let rhs = self.not_expr()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr, CondError> {
        if self.peek() == Some(&Token::Not) {
            self.bump();
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, CondError> {
        let lhs = self.postfix()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.bump();
            let rhs = self.postfix()?;
            return Ok(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn postfix(&mut self) -> Result<Expr, CondError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::LBracket) => {
                    self.bump();
                    let key = self.or_expr()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                Some(Token::Dot) => {
                    self.bump();
                    match self.bump() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Attr(Box::new(expr), name);
                        }
                        _ => return Err(self.unexpected("attribute name")),
                    }
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, CondError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

#[cfg(test)]
#[path = "cond_tests.rs"]
mod tests;
