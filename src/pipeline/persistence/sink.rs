//! Record sinks: the HTTP client for the downstream record service and an
//! in-memory mock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{PersistError, RecordSink};
use crate::models::RecordKind;

// ──────────────────────────────────────────────
// HttpRecordSink
// ──────────────────────────────────────────────

/// Writes records with `POST {base}{collection}/user/{user_id}`.
///
/// The underlying `reqwest::Client` pools connections and is shared by all
/// in-flight requests.
pub struct HttpRecordSink {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpRecordSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersistError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn endpoint(&self, kind: RecordKind, user_id: i64) -> String {
        format!("{}{}/user/{}", self.base_url, kind.collection_path(), user_id)
    }

    fn map_send_error(&self, e: reqwest::Error) -> PersistError {
        if e.is_timeout() {
            PersistError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            PersistError::Connection(self.base_url.clone())
        } else {
            PersistError::HttpClient(e.to_string())
        }
    }
}

#[async_trait]
impl RecordSink for HttpRecordSink {
    async fn write(
        &self,
        kind: RecordKind,
        user_id: i64,
        body: &Value,
    ) -> Result<Value, PersistError> {
        let endpoint = self.endpoint(kind, user_id);
        let response = self
            .client
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::Status { status, body });
        }

        let record = response
            .json::<Value>()
            .await
            .map_err(|e| PersistError::MalformedResponse(e.to_string()))?;

        tracing::debug!(endpoint = %endpoint, status, "Record created");
        Ok(record)
    }
}

// ──────────────────────────────────────────────
// MockRecordSink
// ──────────────────────────────────────────────

type BodyPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// In-memory sink. Accepts every write by default, echoing the body back
/// with a sequential `id`; can be told to reject or delay writes whose body
/// matches a predicate.
pub struct MockRecordSink {
    fail_when: Option<BodyPredicate>,
    slow_when: Option<(BodyPredicate, Duration)>,
    calls: Mutex<Vec<(RecordKind, i64, Value)>>,
    next_id: AtomicU64,
}

impl MockRecordSink {
    pub fn accepting() -> Self {
        Self {
            fail_when: None,
            slow_when: None,
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn failing_when(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::accepting()
        }
    }

    pub fn slow_when(
        mut self,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
        delay: Duration,
    ) -> Self {
        self.slow_when = Some((Box::new(predicate), delay));
        self
    }

    /// Every write received, in arrival order.
    pub fn calls(&self) -> Vec<(RecordKind, i64, Value)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RecordSink for MockRecordSink {
    async fn write(
        &self,
        kind: RecordKind,
        user_id: i64,
        body: &Value,
    ) -> Result<Value, PersistError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((kind, user_id, body.clone()));
        }

        if let Some((predicate, delay)) = &self.slow_when {
            if predicate(body) {
                tokio::time::sleep(*delay).await;
            }
        }

        if self.fail_when.as_ref().is_some_and(|predicate| predicate(body)) {
            return Err(PersistError::Status {
                status: 500,
                body: "mock rejection".into(),
            });
        }

        let mut record = body.clone();
        if let Some(object) = record.as_object_mut() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            object.insert("id".into(), Value::from(id));
        }
        Ok(record)
    }
}
