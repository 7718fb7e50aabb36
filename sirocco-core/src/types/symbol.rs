//! Instrument identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Longest symbol the engine accepts; publisher codes are short in practice.
const MAX_SYMBOL_LEN: usize = 32;

/// Instrument identifier as understood by the publisher.
///
/// Wraps a `String` with validation: non-empty, at most 32 characters, and
/// restricted to alphanumerics plus `-`, `_`, `.` and `/` separators. The
/// engine treats symbols as opaque; formats like `BTC-USDT` and `ES.FUT`
/// are both acceptable.
///
/// # Examples
///
/// ```
/// use sirocco_core::types::Symbol;
///
/// let symbol = Symbol::new("BTC-USDT").unwrap();
/// assert_eq!(symbol.as_str(), "BTC-USDT");
/// assert!(Symbol::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Creates a validated `Symbol`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptySymbol` for an empty string,
    /// `ValidationError::SymbolTooLong` past 32 characters, and
    /// `ValidationError::InvalidSymbol` for disallowed characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if s.len() > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong(s.len(), MAX_SYMBOL_LEN));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        {
            return Err(ValidationError::InvalidSymbol(s));
        }
        Ok(Self(s))
    }

    /// Creates a `Symbol` without validation.
    ///
    /// # Safety
    ///
    /// The caller must ensure the value satisfies the `Symbol::new` rules.
    #[must_use]
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
