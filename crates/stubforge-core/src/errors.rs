//! Error types and non-fatal diagnostics for the stubforge core library.

use serde::{Deserialize, Serialize};

/// Top-level error enum for the stubforge core library.
///
/// Every variant aborts the processing of a single input (one uploaded file,
/// one generation run). Conditions that merely degrade a result are reported
/// as [`Diagnostic`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Required columns not found: {0}")]
    ColumnsNotFound(String),

    #[error("Structure error: {0}")]
    Structure(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// True for errors caused by the shape of an uploaded file rather than by
    /// the host environment.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ForgeError::InvalidFormat(_)
                | ForgeError::Xml(_)
                | ForgeError::ColumnsNotFound(_)
                | ForgeError::Structure(_)
        )
    }
}

pub type ForgeResult<T> = Result<T, ForgeError>;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Category of a non-fatal condition found while parsing or analysing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    EmptyResult,
    SkippedRow,
    UnresolvedReference,
    DanglingMessage,
    DuplicateClass,
}

/// A warning attached to a partial or degraded result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A parse result together with the warnings raised while producing it.
#[derive(Clone, Debug)]
pub struct Parsed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Parsed<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}
