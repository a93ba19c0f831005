use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::enums::AnalysisStatus;

/// Output of one extraction call: the model's verdict plus the
/// shape-specific payload (`parameters`, `impfungen`, `medikamente`,
/// `paragraphs`, dates and summaries).
///
/// The payload is kept as loose JSON so that persistence can decide per
/// sub-record what is usable instead of rejecting the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl AnalysisResult {
    pub fn new(status: AnalysisStatus, payload: Map<String, Value>) -> Self {
        Self { status, payload }
    }

    /// Parse a JSON object carrying a `status` field.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Success
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Top-level string field, ignoring blanks and the
    /// `no_date_detected` placeholder the model emits for missing dates.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        present_text(self.payload.get(name))
    }
}

/// Placeholder the extraction instructions ask for when no date is printed.
pub const NO_DATE_PLACEHOLDER: &str = "no_date_detected";

/// A string value that carries actual content.
pub fn present_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_DATE_PLACEHOLDER)
}
