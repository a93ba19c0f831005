use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analysis::AnalysisResult;
use super::enums::DocumentType;

/// Result of one downstream write: the record the service created, or an
/// absence marker when the write failed or the sub-record was unusable.
///
/// Serializes as the record itself or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistenceOutcome(Option<Value>);

impl PersistenceOutcome {
    pub fn saved(record: Value) -> Self {
        Self(Some(record))
    }

    pub fn absent() -> Self {
        Self(None)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn record(&self) -> Option<&Value> {
        self.0.as_ref()
    }
}

/// What happened on the persistence side of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistenceReport {
    /// The bound gateway operation ran; one outcome per sub-record, in order.
    Completed { outcomes: Vec<PersistenceOutcome> },
    /// The model rejected the document, so nothing was written.
    NotAttempted { reason: String },
    /// The document type is registered as non-persisting.
    Skipped,
}

impl PersistenceReport {
    pub fn outcomes(&self) -> Option<&[PersistenceOutcome]> {
        match self {
            Self::Completed { outcomes } => Some(outcomes),
            _ => None,
        }
    }

    pub fn saved_count(&self) -> usize {
        self.outcomes()
            .map(|o| o.iter().filter(|o| !o.is_absent()).count())
            .unwrap_or(0)
    }
}

/// Where the raw upload ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub filepath: String,
    pub size: u64,
}

/// Final result of one upload, assembled by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub document_type: DocumentType,
    pub user_id: i64,
    pub analysis: AnalysisResult,
    pub persistence: PersistenceReport,
    /// `None` when storing the raw upload failed (see `warnings`).
    pub stored: Option<StoredFile>,
    /// Non-fatal problems, e.g. storage failures.
    pub warnings: Vec<String>,
}
