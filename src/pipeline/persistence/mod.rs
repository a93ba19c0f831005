//! Persistence Gateway: files analysis sub-records into the record service.
//!
//! ```text
//! AnalysisResult ─▶ FanOutPlan (collection + expansion) ─▶ RecordSink × N ─▶ outcomes
//! ```
//!
//! One generic fan-out routine serves all four record kinds; the plans in
//! `mapping` differ only in collection field, field mapping and expansion
//! factor. A failed sub-record never aborts the others: it becomes an
//! absence marker in the outcome sequence.

pub mod fan_out;
pub mod gateway;
pub mod mapping;
pub mod sink;

pub use fan_out::{fan_out, FanOutSettings};
pub use gateway::RecordsGateway;
pub use mapping::{FanOutPlan, MappingContext, WriteItem};
pub use sink::{HttpRecordSink, MockRecordSink};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{AnalysisResult, PersistenceOutcome, RecordKind};

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Record service is not reachable at {0}")]
    Connection(String),

    #[error("Record write timed out after {0}s")]
    Timeout(u64),

    #[error("Record service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed record service response: {0}")]
    MalformedResponse(String),

    #[error("Sub-record is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Sub-record field '{0}' has an invalid value")]
    InvalidField(&'static str),

    #[error("Failed to encode write body: {0}")]
    Encoding(String),
}

/// One remote write to the record service, scoped to a user.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Create one record; returns the record as stored by the service.
    async fn write(
        &self,
        kind: RecordKind,
        user_id: i64,
        body: &Value,
    ) -> Result<Value, PersistError>;
}

/// One persistence operation per record kind. Every operation completes
/// and returns one outcome per write, in input order; none of them fails.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_blood_tests(&self, user_id: i64, analysis: &AnalysisResult)
        -> Vec<PersistenceOutcome>;

    async fn save_vaccinations(&self, user_id: i64, analysis: &AnalysisResult)
        -> Vec<PersistenceOutcome>;

    async fn save_medications(&self, user_id: i64, analysis: &AnalysisResult)
        -> Vec<PersistenceOutcome>;

    async fn save_report(&self, user_id: i64, analysis: &AnalysisResult)
        -> Vec<PersistenceOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traits_are_object_safe() {
        fn _assert_sink(_: &dyn RecordSink) {}
        fn _assert_gateway(_: &dyn PersistenceGateway) {}
    }

    #[test]
    fn missing_field_message_names_field() {
        assert_eq!(
            PersistError::MissingField("Impfdatum").to_string(),
            "Sub-record is missing required field 'Impfdatum'"
        );
    }
}
