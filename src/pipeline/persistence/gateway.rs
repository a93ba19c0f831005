use std::sync::Arc;

use async_trait::async_trait;

use super::fan_out::{fan_out, FanOutSettings};
use super::mapping::{FanOutPlan, BLOOD_TESTS, MEDICATIONS, REPORT, VACCINATIONS};
use super::sink::HttpRecordSink;
use super::{PersistError, PersistenceGateway, RecordSink};
use crate::config::Config;
use crate::models::{AnalysisResult, PersistenceOutcome};

/// Persistence gateway over any `RecordSink`.
pub struct RecordsGateway {
    sink: Arc<dyn RecordSink>,
    settings: FanOutSettings,
}

impl RecordsGateway {
    pub fn new(sink: Arc<dyn RecordSink>, settings: FanOutSettings) -> Self {
        Self { sink, settings }
    }

    /// Gateway writing to the configured record service over HTTP.
    pub fn from_config(config: &Config) -> Result<Self, PersistError> {
        let sink = HttpRecordSink::new(&config.records_base_url, config.write_timeout)?;
        Ok(Self::new(
            Arc::new(sink),
            FanOutSettings {
                concurrency: config.persist_concurrency,
                write_timeout: config.write_timeout,
            },
        ))
    }

    async fn run(
        &self,
        plan: &FanOutPlan,
        user_id: i64,
        analysis: &AnalysisResult,
    ) -> Vec<PersistenceOutcome> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        fan_out(self.sink.as_ref(), plan, user_id, analysis, today, self.settings).await
    }
}

#[async_trait]
impl PersistenceGateway for RecordsGateway {
    async fn save_blood_tests(
        &self,
        user_id: i64,
        analysis: &AnalysisResult,
    ) -> Vec<PersistenceOutcome> {
        self.run(&BLOOD_TESTS, user_id, analysis).await
    }

    async fn save_vaccinations(
        &self,
        user_id: i64,
        analysis: &AnalysisResult,
    ) -> Vec<PersistenceOutcome> {
        self.run(&VACCINATIONS, user_id, analysis).await
    }

    async fn save_medications(
        &self,
        user_id: i64,
        analysis: &AnalysisResult,
    ) -> Vec<PersistenceOutcome> {
        self.run(&MEDICATIONS, user_id, analysis).await
    }

    async fn save_report(&self, user_id: i64, analysis: &AnalysisResult) -> Vec<PersistenceOutcome> {
        self.run(&REPORT, user_id, analysis).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use crate::pipeline::persistence::MockRecordSink;
    use serde_json::json;

    fn gateway(sink: Arc<MockRecordSink>) -> RecordsGateway {
        RecordsGateway::new(sink, FanOutSettings::default())
    }

    #[tokio::test]
    async fn each_operation_targets_its_record_kind() {
        let sink = Arc::new(MockRecordSink::accepting());
        let gw = gateway(sink.clone());

        let meds = AnalysisResult::from_value(json!({
            "status": "success",
            "date": "2024-03-01",
            "medikamente": [{"name": "Ramipril", "daily_intake": 1}]
        }))
        .unwrap();
        let vacc = AnalysisResult::from_value(json!({
            "status": "success",
            "impfungen": [{"Impfstoffname": "FSME", "Krankheit": ["FSME"], "Impfdatum": "2022-01-01"}]
        }))
        .unwrap();

        assert_eq!(gw.save_medications(3, &meds).await.len(), 1);
        assert_eq!(gw.save_vaccinations(3, &vacc).await.len(), 1);

        let kinds: Vec<RecordKind> = sink.calls().iter().map(|c| c.0).collect();
        assert_eq!(kinds, [RecordKind::Medication, RecordKind::Vaccination]);
    }

    #[tokio::test]
    async fn missing_date_defaults_to_today() {
        let sink = Arc::new(MockRecordSink::accepting());
        let gw = gateway(sink.clone());
        let analysis = AnalysisResult::from_value(json!({
            "status": "success",
            "date": "no_date_detected",
            "parameters": [{"name": "HbA1c", "value": 5.4}]
        }))
        .unwrap();

        let outcomes = gw.save_blood_tests(1, &analysis).await;
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(outcomes[0].record().unwrap()["date"], today.as_str());
    }

    #[tokio::test]
    async fn repeated_calls_write_again() {
        let sink = Arc::new(MockRecordSink::accepting());
        let gw = gateway(sink.clone());
        let analysis = AnalysisResult::from_value(json!({
            "status": "success",
            "date": "2024-03-01",
            "summary": "s",
            "paragraphs": []
        }))
        .unwrap();

        gw.save_report(1, &analysis).await;
        gw.save_report(1, &analysis).await;
        assert_eq!(sink.call_count(), 2);
    }
}
