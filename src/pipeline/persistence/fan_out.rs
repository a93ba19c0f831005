//! The one generic fan-out routine behind every persistence operation.

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use serde_json::Value;

use super::mapping::{FanOutPlan, MappingContext, WriteItem};
use super::{PersistError, RecordSink};
use crate::models::{AnalysisResult, PersistenceOutcome, RecordKind};
use crate::pipeline::error::PipelineError;

#[derive(Debug, Clone, Copy)]
pub struct FanOutSettings {
    /// Max in-flight writes; clamped to at least 1.
    pub concurrency: usize,
    /// Bound on each individual write.
    pub write_timeout: Duration,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            write_timeout: Duration::from_secs(15),
        }
    }
}

/// Write every sub-record of `analysis` described by `plan`.
///
/// Returns one outcome per attempted write in input order, whatever order
/// the writes complete in. A missing or non-array collection yields a single
/// absence marker. Never fails.
pub async fn fan_out<S: RecordSink + ?Sized>(
    sink: &S,
    plan: &FanOutPlan,
    user_id: i64,
    analysis: &AnalysisResult,
    today: String,
    settings: FanOutSettings,
) -> Vec<PersistenceOutcome> {
    let Some(items) = analysis.field(plan.collection()).and_then(Value::as_array) else {
        let err = PipelineError::InvalidAnalysisStructure {
            field: plan.collection(),
        };
        tracing::warn!(
            kind = plan.kind.as_str(),
            user_id,
            error = %err,
            "Skipping persistence"
        );
        return vec![PersistenceOutcome::absent()];
    };

    let ctx = MappingContext { analysis, today };
    let writes = (plan.expand)(&ctx, items);
    let total = writes.len();
    let start = Instant::now();

    let outcomes: Vec<PersistenceOutcome> = stream::iter(writes.into_iter().enumerate())
        .map(|(index, item)| write_one(sink, plan.kind, user_id, index, item, settings))
        .buffered(settings.concurrency.max(1))
        .collect()
        .await;

    let saved = outcomes.iter().filter(|o| !o.is_absent()).count();
    tracing::info!(
        kind = plan.kind.as_str(),
        user_id,
        total,
        saved,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Persistence fan-out complete"
    );
    outcomes
}

async fn write_one<S: RecordSink + ?Sized>(
    sink: &S,
    kind: RecordKind,
    user_id: i64,
    index: usize,
    item: WriteItem,
    settings: FanOutSettings,
) -> PersistenceOutcome {
    let result = match item.body {
        Ok(body) => {
            match tokio::time::timeout(settings.write_timeout, sink.write(kind, user_id, &body))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(PersistError::Timeout(settings.write_timeout.as_secs())),
            }
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(record) => {
            tracing::debug!(kind = kind.as_str(), user_id, index, item = %item.label, "Record saved");
            PersistenceOutcome::saved(record)
        }
        Err(source) => {
            let err = PipelineError::SubRecordWriteFailed { index, source };
            tracing::warn!(
                kind = kind.as_str(),
                user_id,
                index,
                item = %item.label,
                error = %err,
                "Sub-record not persisted"
            );
            PersistenceOutcome::absent()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::persistence::mapping::{BLOOD_TESTS, REPORT, VACCINATIONS};
    use crate::pipeline::persistence::MockRecordSink;
    use serde_json::json;

    fn analysis(value: Value) -> AnalysisResult {
        AnalysisResult::from_value(value).unwrap()
    }

    fn blood(names: &[&str]) -> AnalysisResult {
        let parameters: Vec<Value> = names
            .iter()
            .map(|n| json!({"name": n, "value": 1.0}))
            .collect();
        analysis(json!({"status": "success", "date": "2024-03-01", "parameters": parameters}))
    }

    async fn run(sink: &MockRecordSink, plan: &FanOutPlan, a: &AnalysisResult) -> Vec<PersistenceOutcome> {
        fan_out(sink, plan, 7, a, "2026-10-16".into(), FanOutSettings::default()).await
    }

    #[tokio::test]
    async fn failure_in_the_middle_keeps_position() {
        let sink = MockRecordSink::failing_when(|body| body["metric"] == "LDL");
        let outcomes = run(&sink, &BLOOD_TESTS, &blood(&["HbA1c", "LDL", "HDL"])).await;

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].is_absent());
        assert!(outcomes[1].is_absent());
        assert!(!outcomes[2].is_absent());
        assert_eq!(sink.call_count(), 3);
    }

    #[tokio::test]
    async fn order_matches_input_when_early_writes_are_slow() {
        let sink = MockRecordSink::accepting()
            .slow_when(|body| body["metric"] == "A", Duration::from_millis(80));
        let outcomes = run(&sink, &BLOOD_TESTS, &blood(&["A", "B", "C"])).await;

        let metrics: Vec<&str> = outcomes
            .iter()
            .map(|o| o.record().unwrap()["metric"].as_str().unwrap())
            .collect();
        assert_eq!(metrics, ["A", "B", "C"]);
    }

    #[tokio::test]
    async fn missing_collection_yields_single_absence() {
        let sink = MockRecordSink::accepting();
        let a = analysis(json!({"status": "success", "date": "2024-03-01"}));
        let outcomes = run(&sink, &BLOOD_TESTS, &a).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_absent());
        assert_eq!(sink.call_count(), 0);
    }

    #[tokio::test]
    async fn mapping_failures_never_reach_the_sink() {
        let sink = MockRecordSink::accepting();
        let a = analysis(json!({
            "status": "success",
            "date": "2024-03-01",
            "parameters": [{"name": "HbA1c"}, {"name": "LDL", "value": 2.0}]
        }));
        let outcomes = run(&sink, &BLOOD_TESTS, &a).await;

        assert!(outcomes[0].is_absent());
        assert!(!outcomes[1].is_absent());
        assert_eq!(sink.call_count(), 1);
    }

    #[tokio::test]
    async fn vaccination_outcomes_follow_expansion() {
        let sink = MockRecordSink::accepting();
        let a = analysis(json!({
            "status": "success",
            "impfungen": [
                {"Impfstoffname": "Boostrix", "Krankheit": ["Tetanus", "Diphtherie"], "Impfdatum": "2021-05-04"},
                {"Impfstoffname": "FSME", "Krankheit": ["FSME"], "Impfdatum": "2022-01-01"}
            ]
        }));
        let outcomes = run(&sink, &VACCINATIONS, &a).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(sink.calls().len(), 3);
        assert_eq!(outcomes[2].record().unwrap()["disease"], "FSME");
    }

    #[tokio::test]
    async fn report_is_a_single_write() {
        let sink = MockRecordSink::accepting();
        let a = analysis(json!({
            "status": "success",
            "date": "2024-03-01",
            "summary": "Fine.",
            "paragraphs": [{"caption": "A", "full_text": "a"}, {"caption": "B", "full_text": "b"}]
        }));
        let outcomes = run(&sink, &REPORT, &a).await;

        assert_eq!(outcomes.len(), 1);
        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, RecordKind::Report);
        assert_eq!(calls[0].1, 7);
    }

    #[tokio::test]
    async fn slow_write_times_out_as_absence() {
        let sink = MockRecordSink::accepting()
            .slow_when(|body| body["metric"] == "B", Duration::from_millis(500));
        let settings = FanOutSettings {
            concurrency: 2,
            write_timeout: Duration::from_millis(50),
        };
        let outcomes = fan_out(
            &sink,
            &BLOOD_TESTS,
            7,
            &blood(&["A", "B"]),
            "2026-10-16".into(),
            settings,
        )
        .await;

        assert!(!outcomes[0].is_absent());
        assert!(outcomes[1].is_absent());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let sink = MockRecordSink::accepting();
        let settings = FanOutSettings {
            concurrency: 0,
            write_timeout: Duration::from_secs(1),
        };
        let outcomes = fan_out(
            &sink,
            &BLOOD_TESTS,
            7,
            &blood(&["A", "B"]),
            "2026-10-16".into(),
            settings,
        )
        .await;
        assert_eq!(outcomes.len(), 2);
    }
}
