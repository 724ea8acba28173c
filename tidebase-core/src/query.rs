// tidebase-core/src/query.rs
//! Single-clause predicate language shared by collection queries and the
//! change feed.
//!
//! Grammar (keywords case-insensitive, exactly one clause):
//!
//! ```text
//! <clause> := <path> BETWEEN <int> AND <int>
//!           | <path> [NOT] IN ( <lit> [, <lit>]* )
//!           | <path> IS [NOT] NULL
//!           | <path> <cmp> <lit>          <cmp> := = | != | < | <= | > | >=
//! <path>   := value (. IDENT)+
//! ```
//!
//! There is no AND/OR composition; compound input is rejected rather than
//! silently mis-parsed. Parsing and evaluation are split: `parse` produces
//! a tagged [`Comparator`] and `matches` is a pure function of the parsed
//! clause and one record.

pub mod operators;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::document::Document;
use crate::error::{Result, TideBaseError};
use crate::query::operators::{parse_literal, parse_string_list, Comparator, CompareOp};
use crate::value_utils::resolve_path;

lazy_static! {
    static ref BETWEEN_RE: Regex =
        Regex::new(r"(?i)^([A-Za-z_]\w*(?:\.\w+)+)\s+BETWEEN\s+(-?\d+)\s+AND\s+(-?\d+)$").unwrap();
    static ref IN_RE: Regex =
        Regex::new(r"(?i)^([A-Za-z_]\w*(?:\.\w+)+)\s+(NOT\s+)?IN\s*\(([^)]*)\)$").unwrap();
    static ref NULL_RE: Regex =
        Regex::new(r"(?i)^([A-Za-z_]\w*(?:\.\w+)+)\s+IS\s+(NOT\s+)?NULL$").unwrap();
    static ref COMPARE_RE: Regex =
        Regex::new(r"^([A-Za-z_]\w*(?:\.\w+)+)\s*(!=|<=|>=|=|<|>)\s*([^=!<>]+)$").unwrap();
    static ref COMPOSED_RE: Regex = Regex::new(r"(?i)\s(AND|OR)\s").unwrap();
}

/// A parsed, reusable predicate over one document record.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    path: Vec<String>,
    comparator: Comparator,
}

impl Predicate {
    /// Parse a `where` clause.
    ///
    /// Fails with [`TideBaseError::InvalidQuery`] carrying the offending
    /// clause when no pattern matches, the path does not start with the
    /// `value` segment, or the clause composes multiple conditions.
    pub fn parse(clause: &str) -> Result<Predicate> {
        let input = clause.trim();

        if let Some(caps) = BETWEEN_RE.captures(input) {
            let lo = parse_bound(&caps[2], clause)?;
            let hi = parse_bound(&caps[3], clause)?;
            return Ok(Predicate {
                path: parse_path(&caps[1], clause)?,
                comparator: Comparator::Between(lo, hi),
            });
        }

        if let Some(caps) = IN_RE.captures(input) {
            let negated = caps.get(2).is_some();
            let list = parse_string_list(&caps[3]);
            return Ok(Predicate {
                path: parse_path(&caps[1], clause)?,
                comparator: Comparator::In { list, negated },
            });
        }

        if let Some(caps) = NULL_RE.captures(input) {
            let negated = caps.get(2).is_some();
            return Ok(Predicate {
                path: parse_path(&caps[1], clause)?,
                comparator: Comparator::IsNull { negated },
            });
        }

        if let Some(caps) = COMPARE_RE.captures(input) {
            let raw_literal = caps[3].trim();
            reject_composition(raw_literal, clause)?;
            // The regex alternation only yields symbols from_symbol knows
            let op = match CompareOp::from_symbol(&caps[2]) {
                Some(op) => op,
                None => return Err(TideBaseError::InvalidQuery(clause.to_string())),
            };
            return Ok(Predicate {
                path: parse_path(&caps[1], clause)?,
                comparator: Comparator::Compare(op, parse_literal(raw_literal)),
            });
        }

        Err(TideBaseError::InvalidQuery(clause.to_string()))
    }

    /// Check a record against the clause.
    pub fn matches(&self, document: &Document) -> bool {
        self.matches_value(&document.value)
    }

    /// Evaluate against a raw JSON value (the record's `value` field).
    pub fn matches_value(&self, value: &Value) -> bool {
        self.comparator.evaluate(resolve_path(value, &self.path))
    }
}

/// Split a path and enforce the leading `value` segment, which addresses
/// the record's value and is dropped before resolution.
fn parse_path(raw: &str, clause: &str) -> Result<Vec<String>> {
    let mut segments = raw.split('.');
    match segments.next() {
        Some("value") => {}
        _ => {
            return Err(TideBaseError::InvalidQuery(format!(
                "path must start with 'value': {}",
                clause
            )))
        }
    }
    Ok(segments.map(str::to_string).collect())
}

fn parse_bound(raw: &str, clause: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| {
        TideBaseError::InvalidQuery(format!("BETWEEN bound out of range: {}", clause))
    })
}

/// Unquoted literals containing AND/OR are almost certainly an attempted
/// compound predicate; fail loudly instead of comparing against garbage.
fn reject_composition(literal: &str, clause: &str) -> Result<()> {
    if literal.starts_with('\'') || literal.starts_with('"') {
        return Ok(());
    }
    if COMPOSED_RE.is_match(literal) {
        return Err(TideBaseError::InvalidQuery(format!(
            "compound predicates are not supported: {}",
            clause
        )));
    }
    Ok(())
}
