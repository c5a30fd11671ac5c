//! Form pattern table and first-match-wins matcher

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Tax form types recognizable from text alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormType {
    W2,
    F1040,
    F1099Int,
    F1099Div,
}

impl FormType {
    /// Evaluation order of the pattern table
    pub const PRIORITY: [FormType; 4] = [
        FormType::W2,
        FormType::F1040,
        FormType::F1099Int,
        FormType::F1099Div,
    ];

    /// Label used in classification output
    pub fn label(&self) -> &'static str {
        match self {
            FormType::W2 => "W2",
            FormType::F1040 => "1040",
            FormType::F1099Int => "1099INT",
            FormType::F1099Div => "1099DIV",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        // (?s) lets `.*` cross line breaks: phrases only need to co-occur
        match self {
            FormType::W2 => &[
                r"(?is)Form\s*W-2.*Wage\s*and\s*Tax\s*Statement.*\d{4}",
                r"(?is)Employer['’]s\s+(?:name|ID).*Employee['’]s\s+(?:social\s+security|name)",
            ],
            FormType::F1040 => &[
                r"(?ims)^\s*Form\s*1040\b.*U\.S\.\s*Individual\s+Income\s+Tax\s+Return",
                r"(?is)Adjusted\s+Gross\s+Income.*Form\s*1040",
            ],
            FormType::F1099Int => &[r"(?i)\bForm\s*1099-INT\b", r"(?i)\b1099-INT\b"],
            FormType::F1099Div => &[r"(?i)\bForm\s*1099-DIV\b", r"(?i)\b1099-DIV\b"],
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered (form, patterns) pairs, compiled once
static FORM_PATTERNS: LazyLock<Vec<(FormType, Vec<Regex>)>> = LazyLock::new(|| {
    FormType::PRIORITY
        .iter()
        .map(|form| {
            let compiled = form
                .patterns()
                .iter()
                .map(|p| Regex::new(p).expect("static regex"))
                .collect();
            (*form, compiled)
        })
        .collect()
});

/// Return the first form type, in priority order, with any matching pattern.
///
/// `None` means the text does not identify a known form and the caller
/// should continue with the visual / OCR stages.
pub fn match_form(text: &str) -> Option<FormType> {
    FORM_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(form, _)| *form)
}
