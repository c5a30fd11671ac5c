//! Best-effort date / year extraction

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Sentinel rendered when no date or year token is found
pub const UNKNOWN_YEAR: &str = "UNKNOWN";

// 1-2 digit day/month, `/` or `-` separators, 2 or 4 digit year
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-](?:\d{2}|\d{4})\b").expect("static regex")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("static regex"));

/// The token found by [`extract_date`], borrowed from the scanned text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken<'a> {
    /// Literal date such as `03/15/2023` or `1-2-24`
    Date(&'a str),
    /// Bare four digit year between 1900 and 2099
    Year(&'a str),
    /// Nothing date-shaped in the text
    Unknown,
}

impl<'a> DateToken<'a> {
    /// The literal token, or [`UNKNOWN_YEAR`]
    pub fn as_str(&self) -> &'a str {
        match self {
            DateToken::Date(s) | DateToken::Year(s) => s,
            DateToken::Unknown => UNKNOWN_YEAR,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DateToken::Unknown)
    }
}

impl fmt::Display for DateToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find the first date in `text`, falling back to the first year.
///
/// Dates are not checked against a calendar: `31/02/2023` is returned as is.
pub fn extract_date(text: &str) -> DateToken<'_> {
    if let Some(m) = DATE_RE.find(text) {
        return DateToken::Date(m.as_str());
    }
    match YEAR_RE.find(text) {
        Some(m) => DateToken::Year(m.as_str()),
        None => DateToken::Unknown,
    }
}
