//! Wiremock integration tests for GeminiClient and HttpFetcher.
//!
//! These tests verify correct HTTP interaction and error mapping using mocked responses.
#![cfg(feature = "gemini")]

use std::time::Duration;

use huginn::providers::{AnnotationService, ContentFetcher, GeminiClient, HttpFetcher};
use huginn::{
    AdCreative, AnnotatedItem, AnnotationStatus, AssetState, ChannelBatch, Huginn, HuginnError,
    InferenceRequest, PollConfig, RetryConfig, SummaryStatus,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test_key";

fn file_json(state: &str) -> serde_json::Value {
    json!({
        "name": "files/abc123",
        "uri": "https://generativelanguage.example/v1beta/files/abc123",
        "mimeType": "video/mp4",
        "state": state
    })
}

fn generate_json(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

fn annotation_text() -> String {
    json!({
        "hook_design": "base on fire in second one",
        "emotional_appeal": "panic, then relief",
        "content_structure": "threat, upgrade, victory",
        "wow_factor": "one-shot boss kill",
        "copywriting_features": "Only 1% pass level 3"
    })
    .to_string()
}

/// Test raw upload returns a pending asset.
#[tokio::test]
async fn test_upload_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("x-goog-api-key", KEY))
        .and(header("X-Goog-Upload-Protocol", "raw"))
        .and(header("Content-Type", "video/mp4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"file": file_json("PROCESSING")})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let scratch = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(scratch.path(), b"fake video").unwrap();

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let asset = client
        .upload(scratch.path(), "video/mp4", "ad1.mp4")
        .await
        .expect("upload should succeed");

    assert_eq!(asset.name, "files/abc123");
    assert_eq!(asset.state, AssetState::Pending);
}

/// Test a rejected upload surfaces as an upload error.
#[tokio::test]
async fn test_upload_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "Unsupported MIME type"}
        })))
        .mount(&mock_server)
        .await;

    let scratch = tempfile::NamedTempFile::new().unwrap();
    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let err = client
        .upload(scratch.path(), "video/mp4", "ad1.mp4")
        .await
        .unwrap_err();

    match err {
        HuginnError::Upload(msg) => assert!(msg.contains("Unsupported MIME type")),
        other => panic!("expected Upload, got {other:?}"),
    }
}

/// Test the upload keeps authentication failures distinct.
#[tokio::test]
async fn test_upload_auth_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let scratch = tempfile::NamedTempFile::new().unwrap();
    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let err = client
        .upload(scratch.path(), "video/mp4", "ad1.mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, HuginnError::AuthenticationFailed));
}

/// Test file state polling maps ACTIVE and FAILED.
#[tokio::test]
async fn test_asset_state() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/abc123"))
        .and(header("x-goog-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json("ACTIVE")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "files/broken",
            "state": "FAILED"
        })))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();

    let ready = client.asset("files/abc123").await.unwrap();
    assert_eq!(ready.state, AssetState::Ready);
    assert_eq!(ready.uri, "https://generativelanguage.example/v1beta/files/abc123");

    let failed = client.asset("files/broken").await.unwrap();
    assert_eq!(failed.state, AssetState::Failed);
}

/// Test a missing file is an API error, not a missing model.
#[tokio::test]
async fn test_missing_file_is_not_model_not_found() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "file not found"}
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();

    let err = client.asset("files/gone").await.unwrap_err();
    assert!(
        matches!(err, HuginnError::Api { status: 404, ref message } if message == "file not found")
    );

    let err = client.delete_asset("files/gone").await.unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 404, .. }));
    assert!(!err.is_model_unavailable());
}

/// Test asset deletion hits the file resource.
#[tokio::test]
async fn test_delete_asset() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/abc123"))
        .and(header("x-goog-api-key", KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    client.delete_asset("files/abc123").await.unwrap();
}

/// Test generateContent sends schema and media resolution and returns text.
#[tokio::test]
async fn test_generate_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/flash:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseMimeType": "application/json",
                "mediaResolution": "MEDIA_RESOLUTION_LOW"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_json("{\"ok\":true}")))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let request = InferenceRequest::new(json!({"type": "OBJECT"}))
        .file("video/mp4", "https://files/abc123")
        .text("describe")
        .low_media_resolution(true);

    let text = client.generate("flash", &request).await.unwrap();
    assert_eq!(text, "{\"ok\":true}");
}

/// Test status code mapping on generateContent.
#[tokio::test]
async fn test_generate_status_mapping() {
    let mock_server = MockServer::start().await;
    let cases: [(&str, ResponseTemplate); 5] = [
        ("missing", ResponseTemplate::new(404)),
        (
            "busy",
            ResponseTemplate::new(429).insert_header("retry-after", "12"),
        ),
        ("broken", ResponseTemplate::new(503)),
        ("denied", ResponseTemplate::new(401)),
        (
            "invalid",
            ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "bad schema"}
            })),
        ),
    ];
    for (model, response) in cases {
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{model}:generateContent")))
            .respond_with(response)
            .mount(&mock_server)
            .await;
    }

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let request = InferenceRequest::new(json!({})).text("hi");

    let err = client.generate("missing", &request).await.unwrap_err();
    assert!(matches!(err, HuginnError::ModelNotFound(ref m) if m == "missing"));

    let err = client.generate("busy", &request).await.unwrap_err();
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));

    let err = client.generate("broken", &request).await.unwrap_err();
    assert!(matches!(err, HuginnError::Server { status: 503, .. }));

    let err = client.generate("denied", &request).await.unwrap_err();
    assert!(matches!(err, HuginnError::AuthenticationFailed));

    let err = client.generate("invalid", &request).await.unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 400, ref message } if message == "bad schema"));
}

/// Test blocked or empty responses are decode errors.
#[tokio::test]
async fn test_generate_blocked_prompt() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&mock_server)
        .await;

    let client = GeminiClient::with_base_url(KEY, mock_server.uri()).unwrap();
    let err = client
        .generate("flash", &InferenceRequest::new(json!({})).text("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, HuginnError::Decode(ref m) if m.contains("SAFETY")));
}

/// Test the fetcher streams the body to disk and reports non-2xx as fetch errors.
#[tokio::test]
async fn test_http_fetcher() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/ad1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let dest = tempfile::NamedTempFile::new().unwrap();

    let bytes = fetcher
        .fetch_to(&format!("{}/v/ad1.mp4", mock_server.uri()), dest.path())
        .await
        .unwrap();
    assert_eq!(bytes, 2048);
    assert_eq!(std::fs::read(dest.path()).unwrap().len(), 2048);

    let err = fetcher
        .fetch_to(&format!("{}/v/gone.mp4", mock_server.uri()), dest.path())
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Fetch { ref url, .. } if url.ends_with("gone.mp4")));
}

/// Full run: fetch, upload, poll, infer, delete, then summarize.
#[tokio::test]
async fn test_pipeline_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v/ad1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake video".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"file": file_json("ACTIVE")})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_json(&annotation_text())))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;
    let summary = json!({
        "hit_patterns": "instant failure hooks",
        "competitor_tactics": "Applovin leans on fake gameplay",
        "actionable_advice": "test a 2s base-on-fire opener"
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_json(&format!(
            "```json\n{summary}\n```"
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = Huginn::builder()
        .gemini(KEY)
        .gemini_base_url(mock_server.uri())
        .cache_path(dir.path().join("analysis_cache.json"))
        .annotation_models(vec!["flash".into()])
        .summary_models(vec!["pro".into()])
        .retry(RetryConfig::disabled())
        .poll(PollConfig::new().interval(Duration::from_millis(10)))
        .build()
        .unwrap();

    let creative = AdCreative {
        ad_id: "1".into(),
        app_name: "Last War".into(),
        ad_network: "Applovin".into(),
        rank: 1,
        first_seen_at: None,
        last_seen_at: None,
        video_url: format!("{}/v/ad1.mp4", mock_server.uri()),
        thumbnail_url: None,
        duration_seconds: Some(30),
    };

    let annotated = pipeline.annotate(vec![creative]).await;
    assert_eq!(annotated[0].status, AnnotationStatus::Computed);
    assert_eq!(
        annotated[0].annotation.as_ref().unwrap().wow_factor,
        "one-shot boss kill"
    );
    assert_eq!(pipeline.cache().len(), 1);

    let facebook: Vec<AnnotatedItem<AdCreative>> = Vec::new();
    let report = pipeline
        .summarize(&[
            ChannelBatch::new("Applovin", &annotated),
            ChannelBatch::new("Facebook", &facebook),
        ])
        .await;
    assert_eq!(report.status, SummaryStatus::Computed);
    assert_eq!(report.summary.actionable_advice, "test a 2s base-on-fire opener");
}
