use crate::error::SqlShimError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    /// Bare identifier or keyword, as written.
    Word(String),
    /// `"name"` or `` `name` ``, unquoted.
    QuotedIdent(String),
    /// `'text'`, unquoted with `''` collapsed.
    StringLit(String),
    Number(String),
    /// `?` (no index), `?N` or `$N` (1-based index).
    Placeholder(Option<usize>),
    Star,
    Comma,
    LParen,
    RParen,
    Eq,
    Dot,
    Semicolon,
    /// Any other operator run, e.g. `<`, `>=`, `!=`, `||`.
    Operator(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) start: usize,
    pub(super) end: usize,
}

impl Token {
    pub(super) fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    /// The identifier text for bare or quoted names.
    pub(super) fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(word) | TokenKind::QuotedIdent(word) => Some(word),
            _ => None,
        }
    }

    pub(super) fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Word(word) => format!("`{word}`"),
            TokenKind::QuotedIdent(name) => format!("identifier \"{name}\""),
            TokenKind::StringLit(_) => "string literal".to_string(),
            TokenKind::Number(number) => format!("number {number}"),
            TokenKind::Placeholder(_) => "placeholder".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::Dot => "`.`".to_string(),
            TokenKind::Semicolon => "`;`".to_string(),
            TokenKind::Operator(op) => format!("`{op}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct ScanError {
    pub(super) position: usize,
    pub(super) message: &'static str,
}

impl From<ScanError> for SqlShimError {
    fn from(err: ScanError) -> Self {
        SqlShimError::syntax(err.position, err.message)
    }
}

/// Tokenize `sql`, failing on the first unterminated literal, identifier or comment.
pub(super) fn tokenize(sql: &str) -> Result<Vec<Token>, SqlShimError> {
    let (tokens, error) = scan(sql);
    match error {
        Some(err) => Err(err.into()),
        None => Ok(tokens),
    }
}

/// Tokenize as far as possible; the tokens before the first error are kept.
pub(super) fn scan(sql: &str) -> (Vec<Token>, Option<ScanError>) {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        let start = idx;
        let kind = match b {
            _ if b.is_ascii_whitespace() => {
                idx += 1;
                continue;
            }
            _ if is_line_comment_start(bytes, idx) => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
                continue;
            }
            _ if is_block_comment_start(bytes, idx) => match skip_block_comment(bytes, idx) {
                Some(end) => {
                    idx = end;
                    continue;
                }
                None => return (tokens, Some(error_at(start, "unterminated block comment"))),
            },
            b'\'' => match scan_quoted(sql, idx, b'\'') {
                Some((text, end)) => {
                    idx = end;
                    TokenKind::StringLit(text)
                }
                None => return (tokens, Some(error_at(start, "unterminated string literal"))),
            },
            b'"' | b'`' => match scan_quoted(sql, idx, b) {
                Some((text, end)) => {
                    idx = end;
                    TokenKind::QuotedIdent(text)
                }
                None => return (tokens, Some(error_at(start, "unterminated quoted identifier"))),
            },
            b'?' | b'$' => {
                idx += 1;
                match scan_digits(bytes, idx) {
                    Some((digits_end, digits)) => match digits.parse() {
                        Ok(index) => {
                            idx = digits_end;
                            TokenKind::Placeholder(Some(index))
                        }
                        Err(_) => {
                            return (tokens, Some(error_at(start, "placeholder index out of range")));
                        }
                    },
                    None if b == b'?' => TokenKind::Placeholder(None),
                    None => TokenKind::Operator("$".to_string()),
                }
            }
            _ if b.is_ascii_digit() => {
                idx = scan_number(bytes, idx);
                TokenKind::Number(sql[start..idx].to_string())
            }
            _ if is_word_start(b) => {
                while idx < bytes.len() && is_word_part(bytes[idx]) {
                    idx += 1;
                }
                TokenKind::Word(sql[start..idx].to_string())
            }
            b'*' => single(&mut idx, TokenKind::Star),
            b',' => single(&mut idx, TokenKind::Comma),
            b'(' => single(&mut idx, TokenKind::LParen),
            b')' => single(&mut idx, TokenKind::RParen),
            b'=' => single(&mut idx, TokenKind::Eq),
            b'.' => single(&mut idx, TokenKind::Dot),
            b';' => single(&mut idx, TokenKind::Semicolon),
            _ if is_operator(b) => {
                idx += 1;
                while idx < bytes.len() && (is_operator(bytes[idx]) || bytes[idx] == b'=') {
                    if is_line_comment_start(bytes, idx) || is_block_comment_start(bytes, idx) {
                        break;
                    }
                    idx += 1;
                }
                TokenKind::Operator(sql[start..idx].to_string())
            }
            _ => return (tokens, Some(error_at(start, "unexpected character"))),
        };
        tokens.push(Token {
            kind,
            start,
            end: idx,
        });
    }

    (tokens, None)
}

fn error_at(position: usize, message: &'static str) -> ScanError {
    ScanError { position, message }
}

fn single(idx: &mut usize, kind: TokenKind) -> TokenKind {
    *idx += 1;
    kind
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || !b.is_ascii()
}

fn is_word_part(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || !b.is_ascii()
}

fn is_operator(b: u8) -> bool {
    matches!(
        b,
        b'<' | b'>' | b'!' | b'|' | b'+' | b'-' | b'/' | b'%' | b'&' | b'^' | b'~' | b':'
    )
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Returns the index just past the comment that starts at `start`. Comments nest.
fn skip_block_comment(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1u32;
    let mut idx = start + 2;
    while idx < bytes.len() {
        if is_block_comment_start(bytes, idx) {
            depth += 1;
            idx += 2;
        } else if is_block_comment_end(bytes, idx) {
            depth -= 1;
            idx += 2;
            if depth == 0 {
                return Some(idx);
            }
        } else {
            idx += 1;
        }
    }
    None
}

/// Scan a `quote`-delimited run starting at `start`, collapsing doubled quotes.
fn scan_quoted(sql: &str, start: usize, quote: u8) -> Option<(String, usize)> {
    let bytes = sql.as_bytes();
    let mut text = String::new();
    let mut chunk_start = start + 1;
    let mut idx = start + 1;
    while idx < bytes.len() {
        if bytes[idx] == quote {
            text.push_str(&sql[chunk_start..idx]);
            if bytes.get(idx + 1) == Some(&quote) {
                text.push(quote as char);
                idx += 2;
                chunk_start = idx;
                continue;
            }
            return Some((text, idx + 1));
        }
        idx += 1;
    }
    None
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut idx = scan_digits(bytes, start).map_or(start, |(end, _)| end);
    if bytes.get(idx) == Some(&b'.') && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit) {
        idx = scan_digits(bytes, idx + 1).map_or(idx + 1, |(end, _)| end);
    }
    idx
}
