//! Document classification
//!
//! - [`date`]: first date or year token in a text blob
//! - [`forms`]: ordered tax-form pattern table
//! - [`cascade`]: the text layer -> visual identity -> OCR fallback cascade

pub mod cascade;
pub mod date;
pub mod forms;

pub use cascade::{validate_upload, Classifier, Stage};
pub use date::{extract_date, DateToken, UNKNOWN_YEAR};
pub use forms::{match_form, FormType};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category assigned to a submitted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "W2")]
    W2,
    #[serde(rename = "1040")]
    F1040,
    #[serde(rename = "1099INT")]
    F1099Int,
    #[serde(rename = "1099DIV")]
    F1099Div,
    #[serde(rename = "ID_CARD")]
    IdCard,
    #[serde(rename = "HANDWRITTEN")]
    Handwritten,
    #[serde(rename = "OTHER")]
    Other,
}

impl DocumentType {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::W2 => FormType::W2.label(),
            DocumentType::F1040 => FormType::F1040.label(),
            DocumentType::F1099Int => FormType::F1099Int.label(),
            DocumentType::F1099Div => FormType::F1099Div.label(),
            DocumentType::IdCard => "ID_CARD",
            DocumentType::Handwritten => "HANDWRITTEN",
            DocumentType::Other => "OTHER",
        }
    }
}

impl From<FormType> for DocumentType {
    fn from(form: FormType) -> Self {
        match form {
            FormType::W2 => DocumentType::W2,
            FormType::F1040 => DocumentType::F1040,
            FormType::F1099Int => DocumentType::F1099Int,
            FormType::F1099Div => DocumentType::F1099Div,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one classification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_type: DocumentType,
    /// Matched date/year token, or `UNKNOWN`
    pub year: String,
}

impl ClassificationResult {
    pub fn new(document_type: DocumentType, year: DateToken<'_>) -> Self {
        Self {
            document_type,
            year: year.to_string(),
        }
    }
}
