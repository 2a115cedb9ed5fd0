//! Document records
//!
//! A document is the unit of truth for the pipeline: its text, where it came
//! from, the category it was assigned, and whatever fields have been extracted
//! and justified so far.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// One uploaded file
    Document,
    /// One row of an uploaded spreadsheet
    SpreadsheetRow,
}

/// Verbatim excerpt backing an extracted value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub passage: String,
}

impl Justification {
    pub fn new(passage: impl Into<String>) -> Self {
        Self {
            passage: passage.into(),
        }
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_filename: String,
    pub kind: DocumentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default)]
    pub category: Option<String>,
    /// `None` marks an unresolved field: extraction ran and found nothing
    #[serde(default)]
    pub extracted_fields: IndexMap<String, Option<String>>,
    #[serde(default)]
    pub justifications: IndexMap<String, Justification>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document for an ingested file
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        source_filename: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            source_filename: source_filename.into(),
            kind: DocumentKind::Document,
            row_index: None,
            category: None,
            extracted_fields: IndexMap::new(),
            justifications: IndexMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a document for one spreadsheet row (1-based `row_index`)
    pub fn from_row(
        title: impl Into<String>,
        content: impl Into<String>,
        source_filename: impl Into<String>,
        row_index: usize,
    ) -> Self {
        let mut document = Self::new(title, content, source_filename);
        document.kind = DocumentKind::SpreadsheetRow;
        document.row_index = Some(row_index);
        document
    }

    /// Title and content joined the way every vectorizer and prompt sees them
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }

    /// Whether extraction has been attempted for `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.extracted_fields.contains_key(field)
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document() {
        let doc = Document::new("Invoice 12", "Total due: 40 EUR", "invoice12.txt");
        assert_eq!(doc.kind, DocumentKind::Document);
        assert!(doc.category.is_none());
        assert!(doc.extracted_fields.is_empty());
        assert!(Uuid::parse_str(&doc.id).is_ok());
    }

    #[test]
    fn test_row_document() {
        let doc = Document::from_row("Row 3", "text", "sheet.csv", 3);
        assert_eq!(doc.kind, DocumentKind::SpreadsheetRow);
        assert_eq!(doc.row_index, Some(3));
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("médical", 2), "mé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_unresolved_field_serializes_as_null() {
        let mut doc = Document::new("t", "c", "f.txt");
        doc.extracted_fields.insert("montant".to_string(), None);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["extracted_fields"]["montant"].is_null());
    }
}
