use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::to_bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use tempfile::TempDir;

use page_capture::api::models::{CaptureRequest, ScraperQuery};
use page_capture::api::routes::{
    clear_captures_handler, export_handler, list_captures_handler, list_scrapers_handler,
    run_scraper_handler, save_capture_handler,
};
use page_capture::captures::CaptureStore;
use page_capture::config::Config;
use page_capture::document::{DocumentLoader, DocumentRequest, HttpDocumentLoader, PageDocument};
use page_capture::error::Result;
use page_capture::download::NullSink;
use page_capture::scrapers::builtin_registry;
use page_capture::service::CaptureService;
use page_capture::storage::MemoryStore;
use page_capture::AppState;

/// Loads inline documents after a fixed delay.
struct SlowLoader(Duration);

#[async_trait::async_trait]
impl DocumentLoader for SlowLoader {
    async fn load(&self, request: DocumentRequest) -> Result<PageDocument> {
        tokio::time::sleep(self.0).await;
        HttpDocumentLoader.load(request).await
    }
}

fn state(tmp: &TempDir) -> AppState {
    state_with(tmp, Arc::new(HttpDocumentLoader), Duration::from_secs(5))
}

fn state_with(tmp: &TempDir, loader: Arc<dyn DocumentLoader>, request_timeout: Duration) -> AppState {
    let config = Config {
        server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        storage_dir: tmp.path().join("data"),
        download_dir: tmp.path().join("downloads"),
        request_timeout,
    };
    let service = CaptureService::new(
        Arc::new(builtin_registry().unwrap()),
        Arc::new(CaptureStore::new(Arc::new(MemoryStore::new()))),
        Arc::new(NullSink),
        loader,
    );
    AppState {
        config: Arc::new(config),
        service: Arc::new(service),
    }
}

fn capture_request(mode: &str, body: &str) -> CaptureRequest {
    serde_json::from_value(json!({
        "mode": mode,
        "document": {
            "url": "https://www.linkedin.com/search/results/people/?q=1",
            "title": "People",
            "contentType": "text/html",
            "source": format!("<html><body>{}</body></html>", body),
        }
    }))
    .unwrap()
}

async fn body_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn batch_capture_then_list_and_clear() {
    let tmp = TempDir::new().unwrap();
    let st = state(&tmp);

    let resp = save_capture_handler(State(st.clone()), Json(capture_request("batch", "<p>x</p>"))).await;
    let (status, body) = body_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"stored": true}));
    assert_eq!(body["meta"]["status"], "success");

    let (_, body) = body_json(list_captures_handler(State(st.clone())).await).await;
    let captures = body["data"].as_array().unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0]["sourceTitle"], "People");
    assert!(captures[0]["capturedAt"].is_string());

    let (_, body) = body_json(clear_captures_handler(State(st.clone())).await).await;
    assert_eq!(body["data"], json!({"cleared": true}));

    let (_, body) = body_json(list_captures_handler(State(st)).await).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn direct_capture_returns_content_and_filename() {
    let tmp = TempDir::new().unwrap();
    let resp = save_capture_handler(State(state(&tmp)), Json(capture_request("direct", "<p>hi</p>"))).await;
    let (status, body) = body_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["content"].as_str().unwrap().contains("<p>hi</p>"));
    assert!(body["data"]["filename"].as_str().unwrap().ends_with(".html"));
}

#[tokio::test]
async fn empty_export_is_a_conflict_with_message() {
    let tmp = TempDir::new().unwrap();
    let (status, body) = body_json(export_handler(State(state(&tmp))).await).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["meta"]["status"], "error");
    assert!(body["data"].is_null());
    assert!(body["meta"]["message"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn export_returns_zip_attachment() {
    let tmp = TempDir::new().unwrap();
    let st = state(&tmp);
    save_capture_handler(State(st.clone()), Json(capture_request("batch", "<p>x</p>"))).await;

    let resp = export_handler(State(st)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/zip");
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"captures_"));

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 1);
}

#[tokio::test]
async fn scrapers_are_listed_by_url() {
    let tmp = TempDir::new().unwrap();
    let st = state(&tmp);

    let query = ScraperQuery { url: Some("https://www.linkedin.com/search/results/people/?q=a".into()) };
    let resp = list_scrapers_handler(State(st.clone()), Query(query)).await.into_response();
    let (_, body) = body_json(resp).await;
    assert_eq!(body["data"][0]["id"], "linkedin-people");

    let query = ScraperQuery { url: Some("https://other.com".into()) };
    let resp = list_scrapers_handler(State(st.clone()), Query(query)).await.into_response();
    let (_, body) = body_json(resp).await;
    assert_eq!(body["data"], json!([]));

    let resp = list_scrapers_handler(State(st), Query(ScraperQuery { url: None })).await.into_response();
    let (_, body) = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn running_unknown_scraper_is_404() {
    let tmp = TempDir::new().unwrap();
    let resp = run_scraper_handler(
        State(state(&tmp)),
        Path("missing".to_string()),
        Json(capture_request("direct", "")),
    )
    .await;
    let (status, body) = body_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["meta"]["status_code"], 404);
}

#[tokio::test]
async fn running_scraper_returns_structured_result() {
    let tmp = TempDir::new().unwrap();
    let resp = run_scraper_handler(
        State(state(&tmp)),
        Path("linkedin-people".to_string()),
        Json(capture_request("direct", r#"<a aria-label="Profile of Cy" href="/in/cy">Cy</a>"#)),
    )
    .await;
    let (status, body) = body_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stored"], false);
    assert_eq!(body["data"]["result"]["type"], "profiles");
    assert_eq!(body["data"]["result"]["count"], 1);
    assert_eq!(body["data"]["result"]["data"][0]["url"], "https://www.linkedin.com/in/cy");
}

#[tokio::test]
async fn slow_capture_times_out_but_still_lands() {
    let tmp = TempDir::new().unwrap();
    let st = state_with(&tmp, Arc::new(SlowLoader(Duration::from_millis(300))), Duration::from_millis(50));

    let resp = save_capture_handler(State(st.clone()), Json(capture_request("batch", "<p>late</p>"))).await;
    let (status, body) = body_json(resp).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["meta"]["status"], "error");
    assert_eq!(body["meta"]["status_code"], 408);
    assert!(body["data"].is_null());

    let mut stored = 0;
    for _ in 0..40 {
        stored = st.service.list_captures().await.unwrap().len();
        if stored == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(stored, 1);
    let captures = st.service.list_captures().await.unwrap();
    assert!(captures[0].content.contains("<p>late</p>"));
}
