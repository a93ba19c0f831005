//! Request-level error taxonomy of the upload pipeline.

use thiserror::Error;

use super::extraction::ExtractionError;
use super::persistence::PersistError;
use crate::models::ParseEnumError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No image file provided")]
    NoFileProvided,

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractionError),

    /// The analysis lacks the collection a persistence operation fans out
    /// over. Aborts that operation only; never surfaces to the caller.
    #[error("Analysis result has no '{field}' collection")]
    InvalidAnalysisStructure { field: &'static str },

    /// One sub-record could not be written. Recorded as an absence marker.
    #[error("Sub-record {index} write failed: {source}")]
    SubRecordWriteFailed {
        index: usize,
        #[source]
        source: PersistError,
    },
}

impl From<ParseEnumError> for PipelineError {
    fn from(err: ParseEnumError) -> Self {
        PipelineError::UnknownDocumentType(err.value)
    }
}
