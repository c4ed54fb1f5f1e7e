//! End-to-end tests of the HTTP surface over a temporary local store.

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use statements_core::{AccountData, AccountKind, MonthKey, MonthStatus, account};
use statements_server::{AppState, Detection, ServerConfig, StatementParser, router};
use statements_store::LocalStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Parser stand-in: every file takes `delay` and yields `count`
/// transactions, and every PDF is detected as BBVA IP Corp, March 2025.
struct FixedParser {
    count: u64,
    delay: Duration,
}

#[async_trait]
impl StatementParser for FixedParser {
    async fn parse(&self, _kind: AccountKind, path: &Path) -> Result<u64> {
        assert!(path.exists(), "parser got a path that does not exist");
        tokio::time::sleep(self.delay).await;
        Ok(self.count)
    }

    async fn detect(&self, _filename: &str, _bytes: &[u8]) -> Result<Detection> {
        Ok(Detection {
            identifier: Some("012180001232011554".to_string()),
            year: Some(2025),
            month: Some(3),
        })
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    state: Arc<AppState>,
    app: Router,
}

fn harness_with(config: ServerConfig, parse_delay: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let parser = FixedParser {
        count: 42,
        delay: parse_delay,
    };
    let state = AppState::new(config, Arc::new(LocalStore::new(&root)), Arc::new(parser));
    let app = router(Arc::clone(&state));
    Harness {
        _dir: dir,
        root,
        state,
        app,
    }
}

fn harness() -> Harness {
    harness_with(ServerConfig::default(), Duration::ZERO)
}

fn slow_harness() -> Harness {
    harness_with(ServerConfig::default(), Duration::from_millis(150))
}

async fn start_parse(app: &Router, account_id: &str) -> String {
    let (status, body) = send(app, post(&format!("/api/statements/parse/{account_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    body["session_id"].as_str().unwrap().to_string()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn multipart(files: &[(&str, &[u8])]) -> Request<Body> {
    let boundary = "statements-test-boundary";
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Request::post("/api/statements/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Poll a session until it reaches a terminal status.
async fn wait_for(app: &Router, session_id: &str) -> Value {
    for _ in 0..200 {
        let uri = format!("/api/statements/parse-progress/{session_id}");
        let (status, body) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let progress = body["progress"].clone();
        let s = progress["status"].as_str().unwrap_or_default();
        if s == "completed" || s == "error" {
            return progress;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never finished");
}

async fn account_data(app: &Router, id: &str, year: i32) -> AccountData {
    let (status, body) = send(
        app,
        get(&format!("/api/statements/load-account-data/{id}?year={year}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_value(body["account_data"].clone()).unwrap()
}

#[tokio::test]
async fn unknown_account_is_bad_request() {
    let h = harness();
    let (status, body) = send(&h.app, post("/api/statements/parse/nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid account ID");

    let (status, _) = send(&h.app, get("/api/statements/load-account-data/nope?year=2025")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness();
    let (status, body) = send(&h.app, get("/api/statements/parse-progress/stp_sa_1_0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid session ID");
}

#[tokio::test]
async fn parse_of_empty_account_completes() {
    let h = harness();
    let (status, body) = send(&h.app, post("/api/statements/parse/stp_sa")).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert!(session_id.starts_with("stp_sa_"));

    let progress = wait_for(&h.app, &session_id).await;
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["progress_percentage"], 100);
    assert_eq!(progress["files_processed"], 0);
}

#[tokio::test]
async fn upload_stores_file_and_shows_its_month() {
    let h = harness();

    // Seed an inventory so there is something cached.
    let (_, body) = send(&h.app, post("/api/statements/refresh-inventory/stp_sa")).await;
    wait_for(&h.app, body["session_id"].as_str().unwrap()).await;
    assert_eq!(account_data(&h.app, "stp_sa", 2025).await.total_files, 0);
    assert!(h.state.inventory.is_cached().await);

    let name = "ec-646180559700000009-202501.xlsx";
    let (status, body) = send(&h.app, multipart(&[(name, b"sheet"), ("notes.docx", b"x")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], 2);
    assert_eq!(body["successful_uploads"], 1);
    assert_eq!(body["failed_uploads"], 1);
    assert_eq!(body["success"], false);

    assert!(h.root.join("STP SA New").join(name).is_file());

    let data = account_data(&h.app, "stp_sa", 2025).await;
    assert_eq!(data.total_files, 1);
    assert_eq!(data.months[&MonthKey::new(2025, 1).unwrap()].file_count, 1);
}

#[tokio::test]
async fn pdf_without_pattern_is_placed_by_detection() {
    let h = harness();
    let (status, body) = send(&h.app, multipart(&[("scan0001.pdf", b"%PDF-1.4")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["results"][0]["account_id"], "bbva_ip_corp");

    let corp = account::by_id("bbva_ip_corp").unwrap();
    assert!(h.root.join(corp.folder).join("2503 BBVA IP MXN Corp.pdf").is_file());
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let h = harness();
    let boundary = "b";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
    );
    let req = Request::post("/api/statements/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No files provided");
}

#[tokio::test]
async fn parse_then_scan_joins_tracking() {
    let h = harness();
    let xlsx = "ec-646180559700000009-202502.xlsx";
    let pdf = "ec-646180559700000009-202502.pdf";
    send(&h.app, multipart(&[(xlsx, b"sheet"), (pdf, b"%PDF")])).await;

    let (_, body) = send(&h.app, post("/api/statements/parse/stp_sa")).await;
    let progress = wait_for(&h.app, body["session_id"].as_str().unwrap()).await;
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["files_processed"], 1);
    assert_eq!(progress["transactions_added"], 42);

    let data = account_data(&h.app, "stp_sa", 2025).await;
    let feb = &data.months[&MonthKey::new(2025, 2).unwrap()];
    assert_eq!(feb.status, MonthStatus::Complete);
    assert_eq!(feb.file_count, 2);
    // Shared STP statement: counted once.
    assert_eq!(feb.transaction_count, 42);
    assert_eq!(data.total_transactions, 42);

    // Nothing changed, so a second run skips the file.
    let (_, body) = send(&h.app, post("/api/statements/parse/stp_sa")).await;
    let progress = wait_for(&h.app, body["session_id"].as_str().unwrap()).await;
    assert_eq!(progress["files_processed"], 0);
    assert_eq!(progress["files_skipped"], 1);
}

#[tokio::test]
async fn download_serves_stored_file_or_404() {
    let h = harness();
    let name = "ec-646180559700000009-202504.xlsx";
    send(&h.app, multipart(&[(name, b"april")])).await;
    let (_, body) = send(&h.app, post("/api/statements/refresh-all-inventories")).await;
    let progress = wait_for(&h.app, body["session_id"].as_str().unwrap()).await;
    assert_eq!(progress["status"], "completed");

    let resp = h
        .app
        .clone()
        .oneshot(get("/statements/download/stp_sa/4/xlsx?year=2025"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert_eq!(disposition, "attachment; filename=\"stp_sa_2025_Apr.xlsx\"");
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"april");

    let (status, _) = send(&h.app, get("/statements/download/stp_sa/5/xlsx?year=2025")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.app, get("/statements/download/stp_sa/4/docx?year=2025")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn xls_download_keeps_its_own_type() {
    let h = harness();
    send(&h.app, multipart(&[("ec-646180559700000009-202506.xls", b"legacy")])).await;

    let resp = h
        .app
        .clone()
        .oneshot(get("/statements/download/stp_sa/6/xlsx?year=2025"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/vnd.ms-excel");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"stp_sa_2025_Jun.xls\""
    );
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"legacy");
}

#[tokio::test]
async fn concurrent_parses_keep_each_others_tracking() {
    let h = slow_harness();
    send(
        &h.app,
        multipart(&[
            ("ec-646180559700000009-202501.xlsx", b"sheet"),
            ("2501 FMX BBVA MXN.pdf", b"%PDF"),
        ]),
    )
    .await;

    let stp = start_parse(&h.app, "stp_sa").await;
    let bbva = start_parse(&h.app, "bbva_mx_mxn").await;
    for id in [&stp, &bbva] {
        let progress = wait_for(&h.app, id).await;
        assert_eq!(progress["status"], "completed");
        assert_eq!(progress["files_processed"], 1);
    }

    let tracking: Value = serde_json::from_slice(
        &std::fs::read(h.root.join("Inventario").join("parse_tracking.json")).unwrap(),
    )
    .unwrap();
    for id in ["stp_sa", "bbva_mx_mxn"] {
        let identifier = account::by_id(id).unwrap().identifier;
        assert!(tracking.get(identifier).is_some(), "no tracking for {id}");
    }

    // Both files are current, so nothing is parsed twice.
    for id in ["stp_sa", "bbva_mx_mxn"] {
        let session = start_parse(&h.app, id).await;
        let progress = wait_for(&h.app, &session).await;
        assert_eq!(progress["files_processed"], 0, "{id} parsed again");
        assert_eq!(progress["files_skipped"], 1);
    }
}

#[tokio::test]
async fn running_parse_is_reused() {
    let h = slow_harness();
    send(&h.app, multipart(&[("ec-646180559700000009-202503.xlsx", b"sheet")])).await;

    let first = start_parse(&h.app, "stp_sa").await;
    let second = start_parse(&h.app, "stp_sa").await;
    assert_eq!(first, second);

    let progress = wait_for(&h.app, &first).await;
    assert_eq!(progress["files_processed"], 1);

    let third = start_parse(&h.app, "stp_sa").await;
    assert_ne!(third, first);
    assert_eq!(wait_for(&h.app, &third).await["files_skipped"], 1);
}

#[tokio::test]
async fn ui_data_lists_accounts_with_files() {
    let h = harness();
    send(
        &h.app,
        multipart(&[("ec-646990403000000003-202503.xlsx", b"x")]),
    )
    .await;
    let (_, body) = send(&h.app, post("/api/statements/refresh-all-inventories")).await;
    wait_for(&h.app, body["session_id"].as_str().unwrap()).await;

    let (status, body) = send(&h.app, get("/api/statements/ui-data/2025")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 2025);
    let ui = body["ui_data"].as_object().unwrap();
    assert_eq!(ui.len(), 1);
    assert_eq!(ui["stp_ip_pi"]["total_files"], 1);
}

#[tokio::test]
async fn token_is_required_when_configured() {
    let h = harness_with(
        ServerConfig {
            api_token: Some("s3cret".to_string()),
            ..ServerConfig::default()
        },
        Duration::ZERO,
    );

    let (status, body) = send(&h.app, get("/api/statements/config")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let req = Request::get("/api/statements/config")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts"].as_array().unwrap().len(), 9);

    let (status, body) = send(&h.app, get("/api/statements/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
