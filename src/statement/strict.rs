use super::scanner::{Token, TokenKind, tokenize};
use super::{OrderBy, Operation, StatementDescriptor};
use crate::error::SqlShimError;
use crate::types::Scalar;

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "ORDER",
    "BY", "LIMIT", "ASC", "DESC", "AND", "OR", "NOT", "IN", "LIKE", "IS", "NULL", "TRUE",
    "FALSE", "JOIN", "ON", "GROUP", "HAVING", "UNION", "OFFSET", "RETURNING",
];

/// Parse `sql` against the supported grammar, rejecting everything else.
///
/// ```text
/// SELECT (* | col {, col}) FROM table [WHERE col = value] [ORDER BY col [ASC|DESC] {, ...}] [LIMIT n]
/// INSERT INTO table (col {, col}) VALUES (value {, value})
/// UPDATE table SET col = value {, col = value} [WHERE col = value]
/// DELETE FROM table [WHERE col = value]
/// ```
///
/// A value is a placeholder (`?`, or numbered `?N`/`$N`, never mixed) or a literal number,
/// string, `TRUE`, `FALSE` or `NULL`. Every placeholder must have a parameter and every
/// parameter must be used.
///
/// # Errors
///
/// * [`SqlShimError::UnrecognizedStatement`] when the statement does not start with one of the
///   four supported keywords.
/// * [`SqlShimError::SyntaxError`] for anything outside the grammar, including multi-predicate
///   WHERE clauses and non-equality comparisons.
/// * [`SqlShimError::ArityMismatch`] when INSERT columns and values differ in number, or
///   placeholders and parameters do not line up.
pub fn parse_strict(sql: &str, params: &[Scalar]) -> Result<StatementDescriptor, SqlShimError> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser::new(sql, tokens, params);
    let descriptor = parser.statement()?;
    parser.finish()?;
    Ok(descriptor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaceholderStyle {
    Anonymous,
    Numbered,
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    params: &'a [Scalar],
    style: Option<PlaceholderStyle>,
    next_anonymous: usize,
    used: Vec<bool>,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str, tokens: Vec<Token>, params: &'a [Scalar]) -> Self {
        Self {
            sql,
            tokens,
            pos: 0,
            params,
            style: None,
            next_anonymous: 0,
            used: vec![false; params.len()],
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.sql.len(), |t| t.start)
    }

    fn found(&self) -> String {
        self.peek()
            .map_or_else(|| "end of statement".to_string(), Token::describe)
    }

    fn unexpected(&self, expected: &str) -> SqlShimError {
        SqlShimError::syntax(
            self.position(),
            format!("expected {expected}, found {}", self.found()),
        )
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SqlShimError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), SqlShimError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn statement(&mut self) -> Result<StatementDescriptor, SqlShimError> {
        let keyword = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Word(word)) => word.clone(),
            Some(_) => return Err(self.unexpected("a statement keyword")),
            None => {
                return Err(SqlShimError::UnrecognizedStatement(
                    "empty statement".to_string(),
                ));
            }
        };
        self.pos += 1;
        match Operation::from_keyword(&keyword) {
            Operation::Select => self.select(),
            Operation::Insert => self.insert(),
            Operation::Update => self.update(),
            Operation::Delete => self.delete(),
            Operation::Other(keyword) => Err(SqlShimError::UnrecognizedStatement(format!(
                "`{keyword}` is not one of SELECT, INSERT, UPDATE or DELETE"
            ))),
        }
    }

    fn select(&mut self) -> Result<StatementDescriptor, SqlShimError> {
        let mut descriptor = StatementDescriptor::new(Operation::Select);
        if !self.eat(&TokenKind::Star) {
            let mut columns = vec![self.column()?];
            while self.eat(&TokenKind::Comma) {
                columns.push(self.column()?);
            }
            descriptor.select = columns.join(", ");
        }
        self.expect_keyword("FROM")?;
        descriptor.table = Some(self.name("a table name")?);
        self.where_clause(&mut descriptor)?;
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = self.column()?;
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                descriptor.order_by.push(OrderBy { column, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if self.eat_keyword("LIMIT") {
            descriptor.limit = Some(self.limit()?);
        }
        Ok(descriptor)
    }

    fn insert(&mut self) -> Result<StatementDescriptor, SqlShimError> {
        let mut descriptor = StatementDescriptor::new(Operation::Insert);
        self.expect_keyword("INTO")?;
        descriptor.table = Some(self.name("a table name")?);

        self.expect(&TokenKind::LParen, "`(` before the column list")?;
        let mut columns = vec![self.column()?];
        while self.eat(&TokenKind::Comma) {
            columns.push(self.column()?);
        }
        self.expect(&TokenKind::RParen, "`)` after the column list")?;

        let values_at = self.position();
        self.expect_keyword("VALUES")?;
        self.expect(&TokenKind::LParen, "`(` before the value list")?;
        let mut values = vec![self.value()?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.value()?);
        }
        self.expect(&TokenKind::RParen, "`)` after the value list")?;

        if columns.len() != values.len() {
            return Err(SqlShimError::ArityMismatch(format!(
                "INSERT names {} column(s) but VALUES at byte {values_at} has {}",
                columns.len(),
                values.len()
            )));
        }
        for (column, value) in columns.into_iter().zip(values) {
            if descriptor.values.get(&column).is_some() {
                return Err(SqlShimError::syntax(
                    values_at,
                    format!("column `{column}` is listed more than once"),
                ));
            }
            descriptor.values.insert(column, value);
        }
        Ok(descriptor)
    }

    fn update(&mut self) -> Result<StatementDescriptor, SqlShimError> {
        let mut descriptor = StatementDescriptor::new(Operation::Update);
        descriptor.table = Some(self.name("a table name")?);
        self.expect_keyword("SET")?;
        loop {
            let (column, value) = self.equality()?;
            descriptor.values.insert(column, value);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.where_clause(&mut descriptor)?;
        Ok(descriptor)
    }

    fn delete(&mut self) -> Result<StatementDescriptor, SqlShimError> {
        let mut descriptor = StatementDescriptor::new(Operation::Delete);
        self.expect_keyword("FROM")?;
        descriptor.table = Some(self.name("a table name")?);
        self.where_clause(&mut descriptor)?;
        Ok(descriptor)
    }

    fn where_clause(&mut self, descriptor: &mut StatementDescriptor) -> Result<(), SqlShimError> {
        if !self.eat_keyword("WHERE") {
            return Ok(());
        }
        let (column, value) = self.equality()?;
        descriptor.filters.insert(column, value);
        if self.at_keyword("AND") || self.at_keyword("OR") {
            return Err(SqlShimError::syntax(
                self.position(),
                "only a single `column = value` condition is supported in WHERE",
            ));
        }
        Ok(())
    }

    /// `column = value`
    fn equality(&mut self) -> Result<(String, Scalar), SqlShimError> {
        let column = self.column()?;
        if !self.eat(&TokenKind::Eq) {
            return Err(SqlShimError::syntax(
                self.position(),
                format!(
                    "expected `=` after `{column}`, found {}; only equality conditions are supported",
                    self.found()
                ),
            ));
        }
        let value = self.value()?;
        Ok((column, value))
    }

    fn identifier(&mut self, expected: &str) -> Result<String, SqlShimError> {
        let ident = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::QuotedIdent(name)) => name.clone(),
            Some(TokenKind::Word(word))
                if !RESERVED.iter().any(|kw| word.eq_ignore_ascii_case(kw)) =>
            {
                word.clone()
            }
            _ => return Err(self.unexpected(expected)),
        };
        self.pos += 1;
        Ok(ident)
    }

    /// `ident {. ident}`, joined with dots.
    fn name(&mut self, expected: &str) -> Result<String, SqlShimError> {
        let mut name = self.identifier(expected)?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.identifier("an identifier after `.`")?);
        }
        Ok(name)
    }

    /// A column reference; a table qualifier is accepted and dropped.
    fn column(&mut self) -> Result<String, SqlShimError> {
        let name = self.name("a column name")?;
        Ok(match name.rsplit_once('.') {
            Some((_, column)) => column.to_string(),
            None => name,
        })
    }

    fn value(&mut self) -> Result<Scalar, SqlShimError> {
        let position = self.position();
        let Some(token) = self.advance() else {
            return Err(self.unexpected("a value"));
        };
        match token.kind {
            TokenKind::Placeholder(index) => self.bind(index, position),
            TokenKind::StringLit(text) => Ok(Scalar::Text(text)),
            TokenKind::Number(number) => number_literal(&number, false, position),
            TokenKind::Operator(op) if op == "-" => match self.advance() {
                Some(Token {
                    kind: TokenKind::Number(number),
                    ..
                }) => number_literal(&number, true, position),
                _ => Err(SqlShimError::syntax(position, "expected a number after `-`")),
            },
            TokenKind::Word(word) if word.eq_ignore_ascii_case("NULL") => Ok(Scalar::Null),
            TokenKind::Word(word) if word.eq_ignore_ascii_case("TRUE") => Ok(Scalar::Bool(true)),
            TokenKind::Word(word) if word.eq_ignore_ascii_case("FALSE") => {
                Ok(Scalar::Bool(false))
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
        }
    }

    fn limit(&mut self) -> Result<usize, SqlShimError> {
        let position = self.position();
        let before = self.pos;
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Number(number)) => number.parse::<usize>().map_err(|_| {
                SqlShimError::syntax(position, format!("LIMIT {number} is not a row count"))
            }),
            Some(TokenKind::Placeholder(index)) => match self.bind(index, position)? {
                Scalar::Int(n) if n >= 0 => usize::try_from(n).map_err(|_| {
                    SqlShimError::syntax(position, format!("LIMIT {n} is out of range"))
                }),
                other => Err(SqlShimError::syntax(
                    position,
                    format!("LIMIT parameter must be a non-negative integer, got {other}"),
                )),
            },
            _ => {
                self.pos = before;
                Err(self.unexpected("a row count after LIMIT"))
            }
        }
    }

    fn bind(&mut self, index: Option<usize>, position: usize) -> Result<Scalar, SqlShimError> {
        let style = if index.is_some() {
            PlaceholderStyle::Numbered
        } else {
            PlaceholderStyle::Anonymous
        };
        match self.style {
            Some(existing) if existing != style => {
                return Err(SqlShimError::syntax(
                    position,
                    "anonymous `?` and numbered placeholders cannot be mixed",
                ));
            }
            _ => self.style = Some(style),
        }

        let slot = match index {
            Some(0) => {
                return Err(SqlShimError::syntax(
                    position,
                    "placeholder numbers start at 1",
                ));
            }
            Some(n) => n - 1,
            None => {
                let slot = self.next_anonymous;
                self.next_anonymous += 1;
                slot
            }
        };
        let Some(value) = self.params.get(slot) else {
            return Err(SqlShimError::ArityMismatch(format!(
                "placeholder at byte {position} needs parameter {} but only {} supplied",
                slot + 1,
                self.params.len()
            )));
        };
        self.used[slot] = true;
        Ok(value.clone())
    }

    fn finish(&mut self) -> Result<(), SqlShimError> {
        self.eat(&TokenKind::Semicolon);
        if self.peek().is_some() {
            return Err(SqlShimError::syntax(
                self.position(),
                format!("unexpected {} after the end of the statement", self.found()),
            ));
        }
        let unused = self.used.iter().filter(|used| !**used).count();
        if unused > 0 {
            return Err(SqlShimError::ArityMismatch(format!(
                "{} parameter(s) supplied but {unused} not referenced by the statement",
                self.params.len()
            )));
        }
        Ok(())
    }
}

fn number_literal(number: &str, negative: bool, position: usize) -> Result<Scalar, SqlShimError> {
    let text = if negative {
        format!("-{number}")
    } else {
        number.to_string()
    };
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Scalar::Int(i));
    }
    text.parse::<f64>()
        .map(Scalar::Float)
        .map_err(|_| SqlShimError::syntax(position, format!("invalid number {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::ColumnValues;

    fn text(value: &str) -> Scalar {
        Scalar::Text(value.to_string())
    }

    #[test]
    fn select_with_filter_order_and_limit() -> Result<(), SqlShimError> {
        let stmt = parse_strict(
            "SELECT id, name FROM products WHERE category = ? ORDER BY price DESC, id LIMIT 10;",
            &[text("lamps")],
        )?;
        assert_eq!(stmt.operation, Operation::Select);
        assert_eq!(stmt.table.as_deref(), Some("products"));
        assert_eq!(stmt.select, "id, name");
        assert_eq!(stmt.filters.get("category"), Some(&text("lamps")));
        assert_eq!(
            stmt.order_by,
            vec![OrderBy::desc("price"), OrderBy::asc("id")]
        );
        assert_eq!(stmt.limit, Some(10));
        Ok(())
    }

    #[test]
    fn agrees_with_lenient_on_supported_statements() -> Result<(), SqlShimError> {
        let cases: Vec<(&str, Vec<Scalar>)> = vec![
            ("SELECT * FROM products WHERE id = ?", vec![Scalar::Int(7)]),
            ("SELECT name, price FROM products", vec![]),
            (
                "INSERT INTO products (name, price) VALUES (?, ?)",
                vec![text("Foo"), Scalar::Int(100)],
            ),
            ("DELETE FROM users WHERE id = ?", vec![Scalar::Int(3)]),
            (
                "UPDATE orders SET status = ? WHERE id = ?",
                vec![text("paid"), Scalar::Int(2)],
            ),
        ];
        for (sql, params) in cases {
            assert_eq!(parse_strict(sql, &params)?, super::super::parse(sql, &params), "{sql}");
        }
        Ok(())
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = parse_strict("MERGE INTO t USING u", &[]).unwrap_err();
        assert!(matches!(err, SqlShimError::UnrecognizedStatement(_)), "{err}");
        let err = parse_strict("  ", &[]).unwrap_err();
        assert!(matches!(err, SqlShimError::UnrecognizedStatement(_)), "{err}");
    }

    #[test]
    fn multi_predicate_where_is_rejected() {
        let err = parse_strict(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            &[Scalar::Int(1), Scalar::Int(2)],
        )
        .unwrap_err();
        match err {
            SqlShimError::SyntaxError { position, message } => {
                assert_eq!(position, 28);
                assert!(message.contains("single"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn comparison_operators_are_rejected() {
        let err = parse_strict("SELECT * FROM t WHERE price > ?", &[Scalar::Int(1)]).unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
        let err = parse_strict("SELECT * FROM t WHERE name LIKE ?", &[text("a%")]).unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
    }

    #[test]
    fn insert_arity_is_checked() {
        let err = parse_strict(
            "INSERT INTO products (name, price, stock) VALUES (?, ?)",
            &[text("Foo"), Scalar::Int(100)],
        )
        .unwrap_err();
        assert!(matches!(err, SqlShimError::ArityMismatch(_)), "{err}");

        let err = parse_strict(
            "INSERT INTO products (name, price, stock) VALUES (?, ?, ?)",
            &[text("Foo"), Scalar::Int(100)],
        )
        .unwrap_err();
        assert!(matches!(err, SqlShimError::ArityMismatch(_)), "{err}");
    }

    #[test]
    fn surplus_params_are_rejected() {
        let err = parse_strict(
            "DELETE FROM users WHERE id = ?",
            &[Scalar::Int(3), Scalar::Int(4)],
        )
        .unwrap_err();
        assert!(matches!(err, SqlShimError::ArityMismatch(_)), "{err}");
    }

    #[test]
    fn literals_and_numbered_placeholders() -> Result<(), SqlShimError> {
        let stmt = parse_strict(
            "UPDATE coupons SET active = FALSE, discount = -1.5, code = $2 WHERE id = $1",
            &[Scalar::Int(9), text("SPRING")],
        )?;
        assert_eq!(
            stmt.values,
            ColumnValues::from_iter([
                ("active", Scalar::Bool(false)),
                ("discount", Scalar::Float(-1.5)),
                ("code", text("SPRING")),
            ])
        );
        assert_eq!(stmt.filters.get("id"), Some(&Scalar::Int(9)));
        Ok(())
    }

    #[test]
    fn mixed_placeholder_styles_are_rejected() {
        let err = parse_strict(
            "UPDATE t SET a = ? WHERE id = ?1",
            &[Scalar::Int(1)],
        )
        .unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
    }

    #[test]
    fn limit_placeholder_must_be_a_count() -> Result<(), SqlShimError> {
        let stmt = parse_strict("SELECT * FROM t LIMIT ?", &[Scalar::Int(3)])?;
        assert_eq!(stmt.limit, Some(3));
        let err = parse_strict("SELECT * FROM t LIMIT ?", &[Scalar::Int(-1)]).unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
        Ok(())
    }

    #[test]
    fn trailing_tokens_and_joins_are_rejected() {
        let err = parse_strict("DELETE FROM t; DROP TABLE t", &[]).unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
        let err = parse_strict("SELECT * FROM a JOIN b ON a.id = b.id", &[]).unwrap_err();
        assert!(matches!(err, SqlShimError::SyntaxError { .. }), "{err}");
    }

    #[test]
    fn qualified_names() -> Result<(), SqlShimError> {
        let stmt = parse_strict(
            "SELECT p.name FROM public.products WHERE p.id = 4",
            &[],
        )?;
        assert_eq!(stmt.table.as_deref(), Some("public.products"));
        assert_eq!(stmt.select, "name");
        assert_eq!(stmt.filters.get("id"), Some(&Scalar::Int(4)));
        Ok(())
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = parse_strict("SELECT * FROM t WHERE a = 'x", &[]).unwrap_err();
        assert!(
            matches!(err, SqlShimError::SyntaxError { position: 26, .. }),
            "{err}"
        );
    }
}
