//! Core batch types: rows, modes, content types, and per-row outcomes

use std::fmt;

/// The three WordPress content kinds a batch row can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Post,
    Page,
    Category,
}

impl ContentType {
    /// Parse a (trimmed, lowercased) type cell from the data sheet
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "post" => Some(Self::Post),
            "page" => Some(Self::Page),
            "category" => Some(Self::Category),
            _ => None,
        }
    }

    /// REST collection route under /wp-json/wp/v2/
    pub fn rest_route(&self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Page => "pages",
            Self::Category => "categories",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Page => "page",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run does with each row's schema fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Merge the fragment into the resource's existing schema
    Apply,
    /// Write an empty schema, ignoring any fragment column content
    Delete,
}

/// One data-sheet row, consumed exactly once by the orchestrator
#[derive(Debug, Clone)]
pub struct BatchRow {
    /// 1-based position in the data sheet, stable for reporting
    pub ordinal: usize,
    pub url: String,
    /// Raw type cell (trimmed, lowercased); parsed per row so an unknown
    /// type fails only that row
    pub content_type: String,
    /// Normalized site key joining this row to an account
    pub site: String,
    /// Schema fragment to apply; empty in delete mode
    pub fragment: String,
}

/// Terminal state of one processed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Success,
    /// No account registered under the row's site key
    AccountNotFound,
    /// URL did not resolve to a remote id
    ResourceNotFound,
    /// The remote rejected the schema write; carries the error body
    UpdateFailed(String),
    /// Unexpected fault while handling the row (transport error, bad cell, ...)
    ProcessingError(String),
}

impl RowStatus {
    /// Result-column text for the exported workbook
    pub fn result_text(&self) -> String {
        match self {
            Self::Success => "Success".to_string(),
            Self::AccountNotFound => "Account not found".to_string(),
            Self::ResourceNotFound => "Resource not found".to_string(),
            Self::UpdateFailed(detail) => format!("Error: {}", detail),
            Self::ProcessingError(detail) => format!("Error: {}", detail),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Audit record for one row; exactly one per BatchRow, in input order
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub ordinal: usize,
    pub url: String,
    pub site: String,
    pub content_type: String,
    pub status: RowStatus,
}
