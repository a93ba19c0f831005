//! Upload Dispatcher: tag lookup → extraction → persistence → storage.
//!
//! Pure pipeline logic with trait-based DI; the HTTP layer only parses the
//! request and renders the `UploadOutcome`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::PipelineError;
use super::extraction::{ExtractionError, ExtractionPort, VisionExtractor};
use super::persistence::RecordsGateway;
use super::registry::{Persistence, Registry};
use super::storage::{FileStore, LocalFileStore};
use crate::config::Config;
use crate::models::{PersistenceReport, UploadOutcome};

/// One inbound upload, already parsed from the transport.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image: Vec<u8>,
    pub file_name: Option<String>,
    pub user_id: i64,
    pub document_type: String,
}

pub struct UploadDispatcher {
    registry: Arc<Registry>,
    extractor: Arc<dyn ExtractionPort>,
    store: Arc<dyn FileStore>,
    extraction_timeout: Duration,
}

impl UploadDispatcher {
    pub fn new(
        registry: Arc<Registry>,
        extractor: Arc<dyn ExtractionPort>,
        store: Arc<dyn FileStore>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            extractor,
            store,
            extraction_timeout,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run one upload through the pipeline.
    ///
    /// Fails only for request-level errors (no image, unknown tag, failed
    /// extraction). Sub-record write failures and storage failures are
    /// reported inside the outcome.
    pub async fn handle(&self, request: &UploadRequest) -> Result<UploadOutcome, PipelineError> {
        let start = Instant::now();
        let user_id = request.user_id;

        if request.image.is_empty() {
            return Err(PipelineError::NoFileProvided);
        }

        let entry = self.registry.lookup(&request.document_type)?;
        let document_type = entry.document_type.as_str();

        let analysis = match tokio::time::timeout(
            self.extraction_timeout,
            self.extractor
                .extract(entry.output_shape, &entry.instructions, &request.image),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExtractionError::Timeout(self.extraction_timeout.as_secs()).into())
            }
        };

        let persistence = if !analysis.is_success() {
            PersistenceReport::NotAttempted {
                reason: "document rejected by extraction (status: error)".into(),
            }
        } else {
            match &entry.persistence {
                Persistence::Bound(binding) => PersistenceReport::Completed {
                    outcomes: binding.persist(user_id, &analysis).await,
                },
                Persistence::NonPersisting => PersistenceReport::Skipped,
            }
        };

        let mut warnings = Vec::new();
        let stored = match self
            .store
            .store(user_id, request.file_name.as_deref(), &request.image)
            .await
        {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::warn!(user_id, document_type, error = %e, "Failed to store upload");
                warnings.push(format!("Upload could not be stored: {e}"));
                None
            }
        };

        tracing::info!(
            user_id,
            document_type,
            status = analysis.status.as_str(),
            saved = persistence.saved_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upload processed"
        );

        Ok(UploadOutcome {
            success: analysis.is_success(),
            document_type: entry.document_type,
            user_id,
            analysis,
            persistence,
            stored,
            warnings,
        })
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Extraction client: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Record service client: {0}")]
    Persistence(#[from] super::persistence::PersistError),
}

/// Build an `UploadDispatcher` with production implementations:
/// vision extractor, HTTP record service, local upload directory.
pub fn build_dispatcher(config: &Config) -> Result<UploadDispatcher, BuildError> {
    let extractor = VisionExtractor::from_config(config)?;
    let gateway = RecordsGateway::from_config(config)?;
    let store = LocalFileStore::new(config.upload_dir.clone());

    tracing::info!(
        model = %config.vision_model,
        records = %config.records_base_url,
        upload_dir = %config.upload_dir.display(),
        "Upload dispatcher configured"
    );

    Ok(UploadDispatcher::new(
        Arc::new(Registry::build(Arc::new(gateway))),
        Arc::new(extractor),
        Arc::new(store),
        config.extraction_timeout,
    ))
}
