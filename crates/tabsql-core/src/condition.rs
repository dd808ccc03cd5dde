//! Free-text filter expressions.
//!
//! A filter such as `ColumnA > 5 AND ColumnB = 2 OR ColumnC IS NULL` is split
//! into clauses joined by connectives. Each clause is `column operator value`,
//! or `column IS [NOT] NULL` with no value. Column names are returned raw so
//! the caller can sanitize them before [`Condition::render`] builds the
//! parameterized predicate.
//!
//! Connectives and operators are only recognized outside quotes (`'...'`,
//! `"..."`, `[...]`), so values may contain words such as `and`.

use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    /// `<>`
    Ne,
    /// `!=`
    NotEq,
    /// `!>`
    NotGt,
    /// `!<`
    NotLt,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Symbolic operators, longest first so `>=` wins over `>`.
    const SYMBOLS: [(&'static str, Self); 9] = [
        (">=", Self::Ge),
        ("<=", Self::Le),
        ("<>", Self::Ne),
        ("!=", Self::NotEq),
        ("!>", Self::NotGt),
        ("!<", Self::NotLt),
        ("=", Self::Eq),
        (">", Self::Gt),
        ("<", Self::Lt),
    ];

    /// SQL text of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Ne => "<>",
            Self::NotEq => "!=",
            Self::NotGt => "!>",
            Self::NotLt => "!<",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that take no value.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Boolean connective between clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One `column operator [value]` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Raw column name, possibly already quoted.
    pub column: String,
    pub operator: Operator,
    /// The compared value; `None` for unary operators.
    pub value: Option<String>,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
    connectives: Vec<Connective>,
}

impl Condition {
    /// Parses a filter expression.
    pub fn parse(text: &str) -> Result<Self> {
        let (pieces, connectives) = split_connectives(text);
        let clauses = pieces
            .into_iter()
            .map(parse_clause)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            clauses,
            connectives,
        })
    }

    /// Clauses in source order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Connectives in source order; one fewer than the clauses.
    #[must_use]
    pub fn connectives(&self) -> &[Connective] {
        &self.connectives
    }

    /// Raw column names in clause order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.clauses.iter().map(|c| c.column.clone()).collect()
    }

    /// Builds the predicate text and its bound arguments.
    ///
    /// `quoted` holds the sanitized column name for each clause, in clause
    /// order. Unary clauses get no placeholder.
    pub fn render(&self, quoted: &[String]) -> Result<(String, Vec<Value>)> {
        if quoted.len() != self.clauses.len() {
            return Err(Error::General(format!(
                "expected {} sanitized column names, got {}",
                self.clauses.len(),
                quoted.len()
            )));
        }

        let mut sql = String::new();
        let mut args = Vec::new();
        for (i, (clause, column)) in self.clauses.iter().zip(quoted).enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(self.connectives[i - 1].as_sql());
                sql.push(' ');
            }
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(clause.operator.as_sql());
            if let Some(value) = &clause.value {
                sql.push_str(" ?");
                args.push(Value::Text(value.clone()));
            }
        }
        Ok((sql, args))
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn closing_quote(c: char) -> Option<char> {
    match c {
        '\'' => Some('\''),
        '"' => Some('"'),
        '[' => Some(']'),
        _ => None,
    }
}

/// Byte offsets of characters that sit outside any quoted section.
fn unquoted_positions(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut closing: Option<char> = None;
    for (i, c) in text.char_indices() {
        match closing {
            Some(end) if c == end => closing = None,
            Some(_) => {}
            None => {
                if let Some(end) = closing_quote(c) {
                    closing = Some(end);
                } else {
                    positions.push(i);
                }
            }
        }
    }
    positions
}

/// Matches `keyword` as a whole word at byte offset `at`, ignoring case.
fn keyword_at(text: &str, at: usize, keyword: &str) -> bool {
    let rest = &text[at..];
    let Some(head) = rest.get(..keyword.len()) else {
        return false;
    };
    let before_ok = text[..at].chars().next_back().map_or(true, |c| !is_word(c));
    let after_ok = rest[keyword.len()..]
        .chars()
        .next()
        .map_or(true, |c| !is_word(c));
    head.eq_ignore_ascii_case(keyword) && before_ok && after_ok
}

fn split_connectives(text: &str) -> (Vec<&str>, Vec<Connective>) {
    let mut pieces = Vec::new();
    let mut connectives = Vec::new();
    let mut start = 0;
    let mut skip_until = 0;
    for at in unquoted_positions(text) {
        if at < skip_until {
            continue;
        }
        for (keyword, connective) in [("and", Connective::And), ("or", Connective::Or)] {
            if keyword_at(text, at, keyword) {
                pieces.push(&text[start..at]);
                connectives.push(connective);
                start = at + keyword.len();
                skip_until = start;
                break;
            }
        }
    }
    pieces.push(&text[start..]);
    (pieces, connectives)
}

/// Splits `IS [NOT] NULL` keyword sequences, tolerating any whitespace.
fn null_test_at(text: &str, at: usize) -> Option<(Operator, usize)> {
    if !keyword_at(text, at, "is") {
        return None;
    }
    let after_is = at + 2;
    let rest = &text[after_is..];
    let trimmed = rest.trim_start();
    let mut offset = after_is + (rest.len() - trimmed.len());

    let mut operator = Operator::IsNull;
    if keyword_at(text, offset, "not") {
        operator = Operator::IsNotNull;
        offset += 3;
        let rest = &text[offset..];
        offset += rest.len() - rest.trim_start().len();
    }
    if offset == at + 2 || !keyword_at(text, offset, "null") {
        return None;
    }
    Some((operator, offset + 4))
}

fn invalid(clause: &str, reason: &str) -> Error {
    Error::InvalidFilterSyntax {
        clause: clause.trim().to_string(),
        reason: reason.to_string(),
    }
}

fn parse_clause(text: &str) -> Result<Clause> {
    let mut found = None;
    'scan: for at in unquoted_positions(text) {
        if let Some((operator, end)) = null_test_at(text, at) {
            found = Some((at, operator, end));
            break;
        }
        for (symbol, operator) in Operator::SYMBOLS {
            if text[at..].starts_with(symbol) {
                found = Some((at, operator, at + symbol.len()));
                break 'scan;
            }
        }
    }

    let Some((at, operator, end)) = found else {
        return Err(invalid(text, "no comparison operator"));
    };

    let column = text[..at].trim();
    if column.is_empty() {
        return Err(invalid(text, "missing column name"));
    }

    let rest = text[end..].trim();
    let value = if operator.is_unary() {
        if !rest.is_empty() {
            return Err(invalid(text, "unexpected text after NULL test"));
        }
        None
    } else {
        if rest.is_empty() {
            return Err(invalid(text, "missing value"));
        }
        Some(unquote_value(rest).to_string())
    };

    Ok(Clause {
        column: column.to_string(),
        operator,
        value,
    })
}

fn unquote_value(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
