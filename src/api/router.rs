//! HTTP router.
//!
//! Routes are nested under `/api/`. Layers (outermost first): CORS,
//! request tracing, body limit.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router. `max_upload_bytes` bounds the multipart body.
pub fn api_router(ctx: ApiContext, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/upload-document", post(endpoints::documents::upload))
        .route("/document-types", get(endpoints::documents::types))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::pipeline::extraction::MockExtractor;
    use crate::pipeline::persistence::{FanOutSettings, MockRecordSink, RecordsGateway};
    use crate::pipeline::storage::MockFileStore;
    use crate::pipeline::{Registry, UploadDispatcher};

    const BOUNDARY: &str = "avi-test-boundary";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    struct TestApp {
        router: Router,
        sink: Arc<MockRecordSink>,
        extractor: Arc<MockExtractor>,
    }

    fn app_with(reply: Value, sink: MockRecordSink, store: MockFileStore) -> TestApp {
        let sink = Arc::new(sink);
        let extractor = Arc::new(MockExtractor::new(reply));
        let gateway = RecordsGateway::new(sink.clone(), FanOutSettings::default());
        let dispatcher = UploadDispatcher::new(
            Arc::new(Registry::build(Arc::new(gateway))),
            extractor.clone(),
            Arc::new(store),
            Duration::from_secs(5),
        );
        TestApp {
            router: api_router(ApiContext::new(Arc::new(dispatcher)), 1024 * 1024),
            sink,
            extractor,
        }
    }

    fn app(reply: Value) -> TestApp {
        app_with(reply, MockRecordSink::accepting(), MockFileStore::working())
    }

    fn blood_reply() -> Value {
        json!({
            "status": "success",
            "date": "2024-03-01",
            "parameters": [
                {"name": "HbA1c", "value": 5.4},
                {"name": "LDL", "value": 130.0}
            ]
        })
    }

    /// Multipart body with optional image and text fields.
    fn multipart(image: Option<&[u8]>, fields: &[(&str, &str)]) -> Request<Body> {
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"scan.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/upload-document")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, json) = send(app(blood_reply()).router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn document_types_lists_registry() {
        let request = Request::get("/api/document-types").body(Body::empty()).unwrap();
        let (status, json) = send(app(blood_reply()).router, request).await;
        assert_eq!(status, StatusCode::OK);

        let types = json.as_array().unwrap();
        assert_eq!(types.len(), 5);
        assert_eq!(types[0], json!({"tag": "blutbild", "shape": "Blutbild", "persists": true}));
        let other = types.iter().find(|t| t["tag"] == "other").unwrap();
        assert_eq!(other["persists"], false);
    }

    #[tokio::test]
    async fn blood_test_upload_round_trip() {
        let test = app(blood_reply());
        let request = multipart(
            Some(JPEG),
            &[("userId", "42"), ("documentType", "blutbild"), ("timestamp", "t0")],
        );
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["userId"], 42);
        assert_eq!(json["documentType"], "blutbild");
        assert_eq!(json["timestamp"], "t0");
        assert_eq!(json["size"], JPEG.len());
        assert!(json["filename"].as_str().unwrap().ends_with("_scan.jpg"));
        assert_eq!(json["analysis"]["status"], "success");
        assert_eq!(json["analysis"]["parameters"][0]["name"], "HbA1c");
        assert_eq!(json["analysis"]["persistence"]["state"], "completed");
        assert_eq!(
            json["analysis"]["persistence"]["outcomes"].as_array().unwrap().len(),
            2
        );
        assert_eq!(test.sink.call_count(), 2);
    }

    #[tokio::test]
    async fn failed_write_renders_null_outcome() {
        let test = app_with(
            blood_reply(),
            MockRecordSink::failing_when(|body| body["metric"] == "HbA1c"),
            MockFileStore::working(),
        );
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "blutbild")]);
        let (_, json) = send(test.router, request).await;

        let outcomes = &json["analysis"]["persistence"]["outcomes"];
        assert!(outcomes[0].is_null());
        assert_eq!(outcomes[1]["metric"], "LDL");
    }

    #[tokio::test]
    async fn missing_image_returns_400() {
        let test = app(blood_reply());
        let request = multipart(None, &[("userId", "1"), ("documentType", "blutbild")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "NO_FILE");
        assert_eq!(test.extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_document_type_returns_400() {
        let test = app(blood_reply());
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "xray")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "UNKNOWN_DOCUMENT_TYPE");
        assert_eq!(test.extractor.call_count(), 0);
    }

    #[tokio::test]
    async fn non_numeric_user_id_returns_400() {
        let request = multipart(Some(JPEG), &[("userId", "bob"), ("documentType", "blutbild")]);
        let (status, json) = send(app(blood_reply()).router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn missing_document_type_defaults_to_other() {
        let test = app(json!({
            "status": "success",
            "date": "2024-03-01",
            "summary": "Rechnung.",
            "paragraphs": []
        }));
        let request = multipart(Some(JPEG), &[("userId", "1")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["documentType"], "other");
        assert_eq!(json["analysis"]["persistence"]["state"], "skipped");
        assert_eq!(test.sink.call_count(), 0);
    }

    #[tokio::test]
    async fn rejected_document_reports_not_attempted() {
        let test = app(json!({"status": "error", "date": "", "parameters": []}));
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "blutbild")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["analysis"]["persistence"]["state"], "not_attempted");
        assert_eq!(test.sink.call_count(), 0);
    }

    #[tokio::test]
    async fn bare_error_status_is_not_a_gateway_failure() {
        let test = app(json!({"status": "error"}));
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "blutbild")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["analysis"]["status"], "error");
        assert_eq!(json["analysis"]["persistence"]["state"], "not_attempted");
        assert_eq!(test.sink.call_count(), 0);
    }

    #[tokio::test]
    async fn shape_mismatch_returns_502() {
        let test = app(json!({"status": "success"}));
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "impfpass")]);
        let (status, json) = send(test.router, request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["code"], "EXTRACTION_FAILED");
    }

    #[tokio::test]
    async fn storage_failure_still_answers() {
        let test = app_with(blood_reply(), MockRecordSink::accepting(), MockFileStore::failing());
        let request = multipart(Some(JPEG), &[("userId", "1"), ("documentType", "blutbild")]);
        let (status, json) = send(test.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["filename"].is_null());
        assert!(json["filepath"].is_null());
        assert_eq!(json["warnings"].as_array().unwrap().len(), 1);
    }
}
