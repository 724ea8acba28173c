// tidebase-core/src/query/operators.rs
//! Comparator semantics for the single-clause predicate language.
//!
//! Parsing (in `query.rs`) produces a tagged [`Comparator`]; evaluation
//! here is a pure function of the comparator and the resolved JSON value.
//! Type mismatches make a clause false, never an error.

use serde_json::Value;
use std::cmp::Ordering;

use crate::value_utils::compare_numbers;

/// Ordering/equality operator of a basic comparison clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub(crate) fn from_symbol(symbol: &str) -> Option<CompareOp> {
        match symbol {
            "=" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

/// Tagged comparison produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    /// `path <cmp> literal`
    Compare(CompareOp, Value),
    /// `path [NOT] IN (a, b, ...)` - members are always strings
    In { list: Vec<String>, negated: bool },
    /// `path IS [NOT] NULL` - a missing path counts as null
    IsNull { negated: bool },
    /// `path BETWEEN lo AND hi`, inclusive integer bounds
    Between(i64, i64),
}

impl Comparator {
    /// Evaluate against the value a path resolved to.
    /// `None` means the path was missing, which counts as JSON null.
    pub fn evaluate(&self, resolved: Option<&Value>) -> bool {
        let value = resolved.unwrap_or(&Value::Null);
        match self {
            Comparator::Compare(op, literal) => evaluate_compare(*op, value, literal),
            Comparator::In { list, negated } => {
                let found = match value {
                    Value::String(s) => list.iter().any(|member| member == s),
                    _ => false,
                };
                found != *negated
            }
            Comparator::IsNull { negated } => value.is_null() != *negated,
            Comparator::Between(lo, hi) => match value.as_f64() {
                Some(x) => *lo as f64 <= x && x <= *hi as f64,
                None => false,
            },
        }
    }
}

fn evaluate_compare(op: CompareOp, value: &Value, literal: &Value) -> bool {
    match op {
        // JSON equality: types must match, so 5 = '5' is false
        CompareOp::Eq => value == literal,
        CompareOp::Ne => value != literal,
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            match compare_numbers(value, literal) {
                Some(ordering) => match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Eq | CompareOp::Ne => false,
                },
                None => false,
            }
        }
    }
}

/// Parse one literal token: integer first, float when `.` is present,
/// `NULL` (any case) becomes null, everything else is a string with one
/// pair of matching quotes stripped.
pub fn parse_literal(token: &str) -> Value {
    let token = token.trim();
    if token.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::from(n);
    }
    if token.contains('.') {
        if let Ok(f) = token.parse::<f64>() {
            return Value::from(f);
        }
    }
    Value::String(strip_quotes(token).to_string())
}

/// Split an IN-list body on commas; members are trimmed and unquoted.
/// The members stay strings - numeric fields only match when the caller
/// coerces them (documented caller responsibility).
pub fn parse_string_list(body: &str) -> Vec<String> {
    body.split(',')
        .map(|member| strip_quotes(member.trim()).to_string())
        .collect()
}

/// Strip one pair of matching single or double quotes.
fn strip_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'\'' || first == b'"') {
            return &token[1..token.len() - 1];
        }
    }
    token
}
