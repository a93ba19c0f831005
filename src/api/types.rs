//! Shared state and response types for the HTTP layer.

use std::sync::Arc;

use serde::Serialize;

use crate::models::{AnalysisResult, PersistenceReport};
use crate::pipeline::UploadDispatcher;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub dispatcher: Arc<UploadDispatcher>,
}

impl ApiContext {
    pub fn new(dispatcher: Arc<UploadDispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// `analysis` member of the upload response: the extracted payload with the
/// persistence report alongside it.
#[derive(Debug, Serialize)]
pub struct AnalysisView {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub persistence: PersistenceReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: Option<String>,
    pub filepath: Option<String>,
    pub size: u64,
    pub timestamp: String,
    pub user_id: i64,
    pub document_type: String,
    pub analysis: AnalysisView,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentTypeInfo {
    pub tag: &'static str,
    pub shape: &'static str,
    pub persists: bool,
}
