use clap::ValueEnum;

use crate::error::SqlShimError;
use crate::statement::{StatementDescriptor, parse, parse_strict};
use crate::types::Scalar;

/// Which parser turns statement text into a descriptor.
///
/// # Examples
/// ```rust
/// use sql_shim::prelude::*;
///
/// let lenient = ParseMode::Lenient.parse("MERGE INTO t", &[]).unwrap();
/// assert_eq!(lenient.operation, Operation::Select);
/// assert!(ParseMode::Strict.parse("MERGE INTO t", &[]).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum ParseMode {
    /// Only the documented grammar; anything else is an error.
    #[default]
    Strict,
    /// Best-effort extraction compatible with legacy callers; never fails.
    Lenient,
}

impl ParseMode {
    /// Parse `sql` with this mode.
    ///
    /// # Errors
    /// Only [`ParseMode::Strict`] fails; see [`parse_strict`].
    pub fn parse(self, sql: &str, params: &[Scalar]) -> Result<StatementDescriptor, SqlShimError> {
        match self {
            ParseMode::Strict => parse_strict(sql, params),
            ParseMode::Lenient => Ok(parse(sql, params)),
        }
    }
}

/// Options shared by every statement run through a [`SqlShim`](crate::SqlShim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShimOptions {
    pub parse_mode: ParseMode,
}

impl ShimOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }
}

/// Fluent builder for [`ShimOptions`].
#[derive(Debug, Clone, Default)]
pub struct ShimOptionsBuilder {
    opts: ShimOptions,
}

impl ShimOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.opts.parse_mode = parse_mode;
        self
    }

    /// Shorthand for [`ParseMode::Lenient`].
    #[must_use]
    pub fn lenient(self) -> Self {
        self.parse_mode(ParseMode::Lenient)
    }

    #[must_use]
    pub fn finish(self) -> ShimOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_is_the_default() {
        assert_eq!(ShimOptions::default().parse_mode, ParseMode::Strict);
        assert_eq!(
            ShimOptionsBuilder::new().lenient().finish().parse_mode,
            ParseMode::Lenient
        );
    }

    #[test]
    fn lenient_mode_never_fails() {
        assert!(ParseMode::Lenient.parse("not sql at all (", &[]).is_ok());
        assert!(ParseMode::Strict.parse("not sql at all (", &[]).is_err());
    }
}
