use std::fmt;

/// A value-filter expression forwarded verbatim to the Census source.
///
/// The expression is never parsed here. Syntax and column validity are decided
/// by the source's evaluator, and its rejections surface as
/// `CensusError::InvalidFilter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFilter(String);

impl ValueFilter {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Wraps an optional user-supplied filter; blank input means no filter.
    #[must_use]
    pub fn from_optional(expression: Option<&str>) -> Option<Self> {
        expression
            .filter(|value| !value.trim().is_empty())
            .map(Self::new)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_absent() {
        assert_eq!(ValueFilter::from_optional(None), None);
        assert_eq!(ValueFilter::from_optional(Some("")), None);
        assert_eq!(ValueFilter::from_optional(Some("   ")), None);
    }

    #[test]
    fn filters_are_forwarded_verbatim() {
        let filter = ValueFilter::from_optional(Some(" tissue == 'lung' ")).expect("filter kept");
        assert_eq!(filter.as_str(), " tissue == 'lung' ");
    }
}
