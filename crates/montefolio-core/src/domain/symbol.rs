use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Requested ticker, trimmed and upper-cased so it matches cleaned bars.
///
/// Any non-empty ticker is accepted, including `7203.T` and `^GSPC`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = canonical_ticker(input);
        if normalized.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

/// Ticker form shared by bar cleaning and simulation requests.
pub(crate) fn canonical_ticker(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_cases_and_trims() {
        let parsed = Symbol::parse(" brk.b ").expect("symbol should parse");
        assert_eq!(parsed.as_str(), "BRK.B");
    }

    #[test]
    fn accepts_index_prefix_and_digit_leading_codes() {
        assert_eq!(Symbol::parse("^gspc").expect("index").as_str(), "^GSPC");
        assert_eq!(Symbol::parse("7203.t").expect("tokyo").as_str(), "7203.T");
        assert_eq!(Symbol::parse("0700.HK").expect("hong kong").as_str(), "0700.HK");
    }

    #[test]
    fn rejects_blank() {
        assert!(matches!(
            Symbol::parse("   "),
            Err(ValidationError::EmptySymbol)
        ));
    }
}
