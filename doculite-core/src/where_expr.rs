//! Sandboxed predicate language for `$where`.
//!
//! The original `$where` semantics ran an arbitrary host-language
//! expression against the document; that is unacceptable to carry over
//! as-is. This module defines a tiny, closed expression grammar instead:
//! comparisons and boolean combinators over a single bound name, `value`,
//! which is the field value the operator is being evaluated against. There
//! is no function call syntax, no attribute access, and no loop construct,
//! so there is nothing in the grammar capable of an unbounded computation
//! or a side effect.
//!
//! Grammar (lowest to highest precedence):
//!   expr   := or
//!   or     := and ( "||" and )*
//!   and    := not ( "&&" not )*
//!   not    := "!" not | cmp
//!   cmp    := primary ( ("==" | "!=" | ">=" | "<=" | ">" | "<") primary )?
//!   primary:= "value" | "value" ".startswith(" string ")" | "value" ".contains(" string ")"
//!            | number | string | "true" | "false" | "null" | "(" expr ")"

use crate::error::{CollectionError, Result};
use serde_json::Value;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value,
    Lit(Value),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    StartsWith(Box<Expr>, String),
    Contains(Box<Expr>, String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

pub fn parse(source: &str) -> Result<Expr> {
    let mut parser = Parser {
        chars: source.chars().peekable(),
    };
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if parser.chars.peek().is_some() {
        return Err(CollectionError::MalformedFilter(format!(
            "unexpected trailing input in $where expression: {}",
            source
        )));
    }
    Ok(expr)
}

pub fn eval(expr: &Expr, value: &Value) -> Result<bool> {
    Ok(eval_value(expr, value)?.as_bool().unwrap_or(false))
}

fn eval_value(expr: &Expr, value: &Value) -> Result<Value> {
    match expr {
        Expr::Value => Ok(value.clone()),
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Not(inner) => {
            let v = eval_value(inner, value)?;
            Ok(Value::Bool(!truthy(&v)))
        }
        Expr::And(lhs, rhs) => {
            let l = eval_value(lhs, value)?;
            if !truthy(&l) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval_value(rhs, value)?)))
        }
        Expr::Or(lhs, rhs) => {
            let l = eval_value(lhs, value)?;
            if truthy(&l) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval_value(rhs, value)?)))
        }
        Expr::Cmp(lhs, op, rhs) => {
            let l = eval_value(lhs, value)?;
            let r = eval_value(rhs, value)?;
            Ok(Value::Bool(compare(&l, *op, &r)))
        }
        Expr::StartsWith(inner, prefix) => {
            let v = eval_value(inner, value)?;
            Ok(Value::Bool(
                v.as_str().is_some_and(|s| s.starts_with(prefix.as_str())),
            ))
        }
        Expr::Contains(inner, needle) => {
            let v = eval_value(inner, value)?;
            Ok(Value::Bool(
                v.as_str().is_some_and(|s| s.contains(needle.as_str())),
            ))
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        other => !other.is_null() && other != &Value::Bool(false),
    }
}

fn compare(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    use crate::value::Canonical;
    let l = Canonical::from_value(lhs);
    let r = Canonical::from_value(rhs);
    match op {
        CmpOp::Eq => l == r,
        CmpOp::Ne => l != r,
        CmpOp::Gt => l.partial_cmp(&r).is_some_and(|o| o.is_gt()),
        CmpOp::Gte => l.partial_cmp(&r).is_some_and(|o| o.is_ge()),
        CmpOp::Lt => l.partial_cmp(&r).is_some_and(|o| o.is_lt()),
        CmpOp::Lte => l.partial_cmp(&r).is_some_and(|o| o.is_le()),
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn peek_str(&mut self, s: &str) -> bool {
        let mut clone = self.chars.clone();
        for expected in s.chars() {
            match clone.next() {
                Some(c) if c == expected => continue,
                _ => return false,
            }
        }
        true
    }

    fn consume_str(&mut self, s: &str) -> bool {
        if self.peek_str(s) {
            for _ in s.chars() {
                self.chars.next();
            }
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.consume_str("||") {
                let rhs = self.parse_and()?;
                lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        loop {
            self.skip_ws();
            if self.consume_str("&&") {
                let rhs = self.parse_not()?;
                lhs = Expr::And(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.consume_str("!") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_primary()?;
        self.skip_ws();
        let op = if self.consume_str("==") {
            Some(CmpOp::Eq)
        } else if self.consume_str("!=") {
            Some(CmpOp::Ne)
        } else if self.consume_str(">=") {
            Some(CmpOp::Gte)
        } else if self.consume_str("<=") {
            Some(CmpOp::Lte)
        } else if self.consume_str(">") {
            Some(CmpOp::Gt)
        } else if self.consume_str("<") {
            Some(CmpOp::Lt)
        } else {
            None
        };
        match op {
            Some(op) => {
                let rhs = self.parse_primary()?;
                Ok(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.consume_str("(") {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.consume_str(")") {
                return Err(CollectionError::MalformedFilter(
                    "unterminated parenthesis in $where expression".into(),
                ));
            }
            return Ok(inner);
        }
        if self.consume_str("\"") {
            return self.parse_string();
        }
        if self.consume_str("value") {
            if self.consume_str(".startswith(") {
                let arg = self.parse_method_arg("startswith")?;
                return Ok(Expr::StartsWith(Box::new(Expr::Value), arg));
            }
            if self.consume_str(".contains(") {
                let arg = self.parse_method_arg("contains")?;
                return Ok(Expr::Contains(Box::new(Expr::Value), arg));
            }
            return Ok(Expr::Value);
        }
        if self.consume_str("true") {
            return Ok(Expr::Lit(Value::Bool(true)));
        }
        if self.consume_str("false") {
            return Ok(Expr::Lit(Value::Bool(false)));
        }
        if self.consume_str("null") {
            return Ok(Expr::Lit(Value::Null));
        }
        if matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '-') {
            return self.parse_number();
        }
        Err(CollectionError::MalformedFilter(
            "unexpected token in $where expression".into(),
        ))
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let s = self.parse_quoted_string()?;
        Ok(Expr::Lit(Value::String(s)))
    }

    fn parse_quoted_string(&mut self) -> Result<String> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('"') => break,
                Some(c) => s.push(c),
                None => {
                    return Err(CollectionError::MalformedFilter(
                        "unterminated string literal in $where expression".into(),
                    ))
                }
            }
        }
        Ok(s)
    }

    /// Parse the `"..."` `)` tail of a `.startswith(`/`.contains(` call,
    /// whose opening `(` has already been consumed.
    fn parse_method_arg(&mut self, method: &str) -> Result<String> {
        self.skip_ws();
        if !self.consume_str("\"") {
            return Err(CollectionError::MalformedFilter(format!(
                "{}(...) requires a string literal argument",
                method
            )));
        }
        let arg = self.parse_quoted_string()?;
        self.skip_ws();
        if !self.consume_str(")") {
            return Err(CollectionError::MalformedFilter(format!(
                "unterminated {}(...) call in $where expression",
                method
            )));
        }
        Ok(arg)
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let mut s = String::new();
        if matches!(self.chars.peek(), Some('-')) {
            s.push('-');
            self.chars.next();
        }
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            s.push(self.chars.next().unwrap());
        }
        let num: f64 = s.parse().map_err(|_| {
            CollectionError::MalformedFilter(format!("invalid number literal: {}", s))
        })?;
        let value = serde_json::Number::from_f64(num)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        Ok(Expr::Lit(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compares_value_against_literal() {
        let expr = parse("value > 5").unwrap();
        assert!(eval(&expr, &json!(10)).unwrap());
        assert!(!eval(&expr, &json!(1)).unwrap());
    }

    #[test]
    fn combines_with_and_or() {
        let expr = parse("value > 5 && value < 10").unwrap();
        assert!(eval(&expr, &json!(7)).unwrap());
        assert!(!eval(&expr, &json!(20)).unwrap());

        let expr = parse("value == 1 || value == 2").unwrap();
        assert!(eval(&expr, &json!(2)).unwrap());
    }

    #[test]
    fn negation_and_parens() {
        let expr = parse("!(value == 1)").unwrap();
        assert!(eval(&expr, &json!(2)).unwrap());
        assert!(!eval(&expr, &json!(1)).unwrap());
    }

    #[test]
    fn string_literal_comparison() {
        let expr = parse("value == \"ok\"").unwrap();
        assert!(eval(&expr, &json!("ok")).unwrap());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("value > 5 )").is_err());
    }

    #[test]
    fn startswith_matches_string_prefix() {
        let expr = parse("value.startswith(\"ad\")").unwrap();
        assert!(eval(&expr, &json!("admin")).unwrap());
        assert!(!eval(&expr, &json!("staff")).unwrap());
        assert!(!eval(&expr, &json!(42)).unwrap());
    }

    #[test]
    fn contains_matches_substring() {
        let expr = parse("value.contains(\"mi\")").unwrap();
        assert!(eval(&expr, &json!("admin")).unwrap());
        assert!(!eval(&expr, &json!("staff")).unwrap());
    }

    #[test]
    fn startswith_composes_with_boolean_operators() {
        let expr = parse("value.startswith(\"a\") || value.contains(\"z\")").unwrap();
        assert!(eval(&expr, &json!("alice")).unwrap());
        assert!(eval(&expr, &json!("zorro")).unwrap());
        assert!(!eval(&expr, &json!("bob")).unwrap());
    }

    #[test]
    fn startswith_requires_string_literal_argument() {
        assert!(parse("value.startswith(5)").is_err());
        assert!(parse("value.startswith(\"a\"").is_err());
    }
}
