//! Extraction Port: structured-field extraction from a document image.
//!
//! The dispatcher only sees the `ExtractionPort` trait. Any retry policy
//! belongs to the implementation, not to the caller.

pub mod vision;

pub use vision::{detect_image_mime, MockExtractor, VisionExtractor};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AnalysisResult, OutputShape};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Vision API is not reachable at {0}")]
    Connection(String),

    #[error("Vision request timed out after {0}s")]
    Timeout(u64),

    #[error("Vision API returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Model refused the request: {0}")]
    Refused(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Output does not match the requested shape: {0}")]
    ShapeMismatch(String),
}

/// Capability that turns an image into an `AnalysisResult` conforming to
/// `shape`, guided by natural-language `instructions`.
///
/// Implementations must fail rather than return output that does not
/// conform to `shape`.
#[async_trait]
pub trait ExtractionPort: Send + Sync {
    async fn extract(
        &self,
        shape: OutputShape,
        instructions: &str,
        image: &[u8],
    ) -> Result<AnalysisResult, ExtractionError>;
}
