use tracing::debug;

use super::scanner::{Token, TokenKind, scan};
use super::{ColumnValues, Operation, StatementDescriptor};
use crate::types::Scalar;

/// Parse `sql` the forgiving way. Never fails.
///
/// Anything that does not match leaves the corresponding field at its zero value: no table,
/// no filters, no values, `*` for the column list. An unrecognized leading keyword is treated as
/// `SELECT`. Only the first `column = ?` of the WHERE clause is kept, and INSERT columns are
/// zipped with `params` positionally, so surplus params are ignored and missing ones truncate
/// the bindings.
///
/// ```rust
/// use sql_shim::prelude::*;
///
/// let stmt = parse("SELECT * FROM products WHERE id = ?", &[Scalar::Int(7)]);
/// assert_eq!(stmt.table.as_deref(), Some("products"));
/// assert_eq!(stmt.filters.get("id"), Some(&Scalar::Int(7)));
/// ```
#[must_use]
pub fn parse(sql: &str, params: &[Scalar]) -> StatementDescriptor {
    let (tokens, scan_error) = scan(sql);
    if let Some(err) = scan_error {
        debug!(
            position = err.position,
            reason = err.message,
            "statement only partially tokenized"
        );
    }

    let operation = match tokens.first().and_then(|t| match &t.kind {
        TokenKind::Word(word) => Some(Operation::from_keyword(word)),
        _ => None,
    }) {
        Some(Operation::Other(keyword)) => {
            debug!(%keyword, "unrecognized statement keyword, treating as SELECT");
            Operation::Select
        }
        Some(operation) => operation,
        None => {
            debug!("statement has no leading keyword, treating as SELECT");
            Operation::Select
        }
    };

    let mut descriptor = StatementDescriptor::new(operation.clone());
    descriptor.table = match operation {
        Operation::Select | Operation::Delete => name_after_keyword(&tokens, "FROM"),
        Operation::Insert => name_after_keyword(&tokens, "INTO"),
        Operation::Update => read_name(&tokens, 1).map(|(name, _)| name),
        Operation::Other(_) => None,
    };

    // Placeholders consumed by VALUES/SET come before the one WHERE binds.
    let mut bound = 0;
    match operation {
        Operation::Insert => {
            descriptor.values = insert_values(&tokens, params);
            bound = descriptor.values.len();
        }
        Operation::Update => {
            descriptor.values = set_values(&tokens, params, &mut bound);
        }
        _ => {}
    }

    descriptor.filters = where_equality(&tokens, params, bound);
    if operation == Operation::Select {
        descriptor.select = select_list(sql, &tokens);
    }
    descriptor
}

fn find_keyword(tokens: &[Token], keyword: &str) -> Option<usize> {
    tokens.iter().position(|t| t.is_keyword(keyword))
}

/// Read `ident {. ident}` at `idx`, returning the dotted name and the index after it.
fn read_name(tokens: &[Token], idx: usize) -> Option<(String, usize)> {
    let mut name = tokens.get(idx)?.identifier()?.to_string();
    let mut next = idx + 1;
    while let (Some(dot), Some(part)) = (tokens.get(next), tokens.get(next + 1)) {
        match (&dot.kind, part.identifier()) {
            (TokenKind::Dot, Some(ident)) => {
                name.push('.');
                name.push_str(ident);
                next += 2;
            }
            _ => break,
        }
    }
    Some((name, next))
}

fn name_after_keyword(tokens: &[Token], keyword: &str) -> Option<String> {
    let idx = find_keyword(tokens, keyword)?;
    read_name(tokens, idx + 1).map(|(name, _)| name)
}

/// `INSERT INTO t (a, b) VALUES (...)`: zip the column list with `params`.
fn insert_values(tokens: &[Token], params: &[Scalar]) -> ColumnValues {
    let Some(columns) = insert_columns(tokens) else {
        return ColumnValues::new();
    };
    let has_values_clause = find_keyword(tokens, "VALUES")
        .and_then(|idx| tokens.get(idx + 1))
        .is_some_and(|t| t.kind == TokenKind::LParen);
    if !has_values_clause {
        return ColumnValues::new();
    }
    if columns.len() != params.len() {
        debug!(
            columns = columns.len(),
            params = params.len(),
            "INSERT column count differs from parameter count, binding positionally"
        );
    }
    columns.into_iter().zip(params.iter().cloned()).collect()
}

fn insert_columns(tokens: &[Token]) -> Option<Vec<String>> {
    let into = find_keyword(tokens, "INTO")?;
    let (_, mut idx) = read_name(tokens, into + 1)?;
    if tokens.get(idx)?.kind != TokenKind::LParen {
        return None;
    }
    idx += 1;
    let mut columns = Vec::new();
    loop {
        let (column, next) = read_name(tokens, idx)?;
        columns.push(column.rsplit('.').next().unwrap_or(&column).to_string());
        match tokens.get(next)?.kind {
            TokenKind::Comma => idx = next + 1,
            TokenKind::RParen => return Some(columns),
            _ => return None,
        }
    }
}

/// `UPDATE t SET a = ?, b = 'x'`: placeholders bind params in order, literals bind themselves.
fn set_values(tokens: &[Token], params: &[Scalar], bound: &mut usize) -> ColumnValues {
    let mut values = ColumnValues::new();
    let Some(set) = find_keyword(tokens, "SET") else {
        return values;
    };
    let mut idx = set + 1;
    while let Some((column, next)) = read_name(tokens, idx) {
        if tokens.get(next).map(|t| &t.kind) != Some(&TokenKind::Eq) {
            break;
        }
        let Some(value_token) = tokens.get(next + 1) else {
            break;
        };
        let column = column.rsplit('.').next().unwrap_or(&column).to_string();
        match &value_token.kind {
            TokenKind::Placeholder(_) => {
                if let Some(param) = params.get(*bound) {
                    values.insert(column, param.clone());
                }
                *bound += 1;
            }
            _ => match literal_value(value_token) {
                Some(value) => values.insert(column, value),
                None => break,
            },
        }
        match tokens.get(next + 2) {
            Some(t) if t.kind == TokenKind::Comma => idx = next + 3,
            _ => break,
        }
    }
    values
}

fn literal_value(token: &Token) -> Option<Scalar> {
    match &token.kind {
        TokenKind::StringLit(text) => Some(Scalar::Text(text.clone())),
        TokenKind::Number(number) => number
            .parse::<i64>()
            .map(Scalar::Int)
            .or_else(|_| number.parse::<f64>().map(Scalar::Float))
            .ok(),
        TokenKind::Word(word) if word.eq_ignore_ascii_case("NULL") => Some(Scalar::Null),
        TokenKind::Word(word) if word.eq_ignore_ascii_case("TRUE") => Some(Scalar::Bool(true)),
        TokenKind::Word(word) if word.eq_ignore_ascii_case("FALSE") => Some(Scalar::Bool(false)),
        _ => None,
    }
}

/// First `column = ?` between WHERE and ORDER/LIMIT/end, bound to `params[bound]`.
fn where_equality(tokens: &[Token], params: &[Scalar], bound: usize) -> ColumnValues {
    let mut filters = ColumnValues::new();
    let Some(start) = find_keyword(tokens, "WHERE") else {
        return filters;
    };
    let clause = &tokens[start + 1..];
    let end = clause
        .iter()
        .position(|t| t.is_keyword("ORDER") || t.is_keyword("LIMIT"))
        .unwrap_or(clause.len());
    let clause = &clause[..end];

    let matched = clause.windows(3).find_map(|w| match (&w[1].kind, &w[2].kind) {
        (TokenKind::Eq, TokenKind::Placeholder(_)) => w[0].identifier(),
        _ => None,
    });
    if let (Some(column), Some(param)) = (matched, params.get(bound)) {
        filters.insert(column, param.clone());
    }
    filters
}

/// Raw source text between SELECT and FROM, or `*`.
fn select_list(sql: &str, tokens: &[Token]) -> String {
    let Some(select) = find_keyword(tokens, "SELECT") else {
        return "*".to_string();
    };
    let Some(from) = tokens[select + 1..]
        .iter()
        .position(|t| t.is_keyword("FROM"))
        .map(|offset| select + 1 + offset)
    else {
        return "*".to_string();
    };
    let list = sql[tokens[select].end..tokens[from].start].trim();
    if list.is_empty() {
        "*".to_string()
    } else {
        list.to_string()
    }
}
