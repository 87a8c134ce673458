//! Arithmetic expressions for infill load functions.
//!
//! Grammar (usual precedence, `^` is right associative):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('-' | '+') unary | power
//! power  := atom ('^' unary)?
//! atom   := number | identifier | '(' expr ')'
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable(String),
    Negate(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser {
            chars: source.char_indices().collect(),
            pos: 0,
            depth: 0,
        };
        let root = parser.expr()?;
        parser.skip_ws();
        if let Some(&(at, c)) = parser.chars.get(parser.pos) {
            return Err(expression_error(at, format!("unexpected '{c}'")));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with the given variable bindings; unbound variables are an error.
    pub fn evaluate(&self, bindings: &[(&str, f64)]) -> Result<f64> {
        eval(&self.root, bindings)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Expression {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Expression::parse(&value)
    }
}

impl From<Expression> for String {
    fn from(value: Expression) -> Self {
        value.source
    }
}

fn eval(node: &Node, bindings: &[(&str, f64)]) -> Result<f64> {
    Ok(match node {
        Node::Number(v) => *v,
        Node::Variable(name) => bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| expression_error(0, format!("unbound variable '{name}'")))?,
        Node::Negate(inner) => -eval(inner, bindings)?,
        Node::Binary(op, lhs, rhs) => {
            let (a, b) = (eval(lhs, bindings)?, eval(rhs, bindings)?);
            match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => a / b,
                Op::Rem => a % b,
                Op::Pow => a.powf(b),
            }
        }
    })
}

fn expression_error(position: usize, message: String) -> ModelError {
    ModelError::Expression { position, message }
}

/// Deepest nesting of signs, exponents and parentheses accepted
const MAX_DEPTH: usize = 256;

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|(_, c)| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(at, _)| at)
            .unwrap_or_else(|| self.chars.last().map(|&(at, c)| at + c.len_utf8()).unwrap_or(0))
    }

    fn expr(&mut self) -> Result<Node> {
        let mut lhs = self.term()?;
        while let Some(c @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            let op = if c == '+' { Op::Add } else { Op::Sub };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        while let Some(c @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            let op = match c {
                '*' => Op::Mul,
                '/' => Op::Div,
                _ => Op::Rem,
            };
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node> {
        if self.depth == MAX_DEPTH {
            return Err(expression_error(self.offset(), "expression nested too deeply".into()));
        }
        self.depth += 1;
        let node = self.signed();
        self.depth -= 1;
        node
    }

    fn signed(&mut self) -> Result<Node> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(Node::Negate(Box::new(self.unary()?)))
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.atom()?;
        if self.peek() == Some('^') {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(Op::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if self.peek() != Some(')') {
                    return Err(expression_error(self.offset(), "expected ')'".into()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                let start = self.pos;
                while self
                    .chars
                    .get(self.pos)
                    .is_some_and(|(_, c)| c.is_alphanumeric() || *c == '_')
                {
                    self.pos += 1;
                }
                let name: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
                Ok(Node::Variable(name))
            }
            Some(c) => Err(expression_error(self.offset(), format!("unexpected '{c}'"))),
            None => Err(expression_error(self.offset(), "unexpected end of expression".into())),
        }
    }

    fn number(&mut self) -> Result<Node> {
        let start = self.pos;
        let at = self.offset();
        let digit_run = |p: &mut Parser| {
            while p.chars.get(p.pos).is_some_and(|(_, c)| c.is_ascii_digit()) {
                p.pos += 1;
            }
        };

        digit_run(self);
        if self.chars.get(self.pos).is_some_and(|&(_, c)| c == '.') {
            self.pos += 1;
            digit_run(self);
        }
        if self.chars.get(self.pos).is_some_and(|&(_, c)| c == 'e' || c == 'E') {
            let mark = self.pos;
            self.pos += 1;
            if self.chars.get(self.pos).is_some_and(|&(_, c)| c == '+' || c == '-') {
                self.pos += 1;
            }
            let exponent_start = self.pos;
            digit_run(self);
            if self.pos == exponent_start {
                self.pos = mark;
            }
        }

        let text: String = self.chars[start..self.pos].iter().map(|&(_, c)| c).collect();
        text.parse::<f64>()
            .map(Node::Number)
            .map_err(|_| expression_error(at, format!("invalid number '{text}'")))
    }
}
