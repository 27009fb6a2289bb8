//! HttpExportGateway against an in-process fake export service.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use landwatch_cloud::{
    Acquisition, AcquisitionGateway, AcquisitionRequest, BearerToken, CloudError, DateWindow,
    ExportOptions, HttpClient, HttpExportGateway,
};
use landwatch_core::io::{read_band_image, write_band_image_to_buffer};
use landwatch_core::{AoiPolygon, BandImage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, PartialEq)]
enum Outcome {
    Completed,
    NoValidPixels,
    Failed,
    NeverFinishes,
    Unauthorized,
}

#[derive(Clone)]
struct FakeService {
    outcome: Outcome,
    polls: Arc<AtomicUsize>,
    image: Arc<Vec<u8>>,
    last_auth: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl FakeService {
    fn new(outcome: Outcome) -> Self {
        let img = BandImage::constant(8, 8, &[812.0, 640.0, 455.0, 2310.0]);
        Self {
            outcome,
            polls: Arc::new(AtomicUsize::new(0)),
            image: Arc::new(write_band_image_to_buffer(&img).unwrap()),
            last_auth: Arc::new(Mutex::new(None)),
            last_body: Arc::new(Mutex::new(None)),
        }
    }
}

async fn submit(
    State(svc): State<FakeService>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if svc.outcome == Outcome::Unauthorized {
        return Err(StatusCode::UNAUTHORIZED);
    }
    *svc.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *svc.last_body.lock().unwrap() = Some(body);
    Ok(Json(json!({ "job_id": "job-1", "state": "pending" })))
}

async fn status(State(svc): State<FakeService>, Path(id): Path<String>) -> Json<Value> {
    let polls = svc.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let body = match svc.outcome {
        _ if polls < 2 => json!({ "job_id": id, "state": "running" }),
        Outcome::NeverFinishes => json!({ "job_id": id, "state": "running" }),
        Outcome::Completed => json!({
            "job_id": id,
            "state": "completed",
            "download_url": format!("/files/{id}.tif"),
        }),
        Outcome::NoValidPixels => json!({ "job_id": id, "state": "no_valid_pixels" }),
        Outcome::Failed | Outcome::Unauthorized => json!({
            "job_id": id,
            "state": "failed",
            "error_message": "quota exceeded",
        }),
    };
    Json(body)
}

async fn download(State(svc): State<FakeService>) -> Vec<u8> {
    svc.image.as_ref().clone()
}

async fn spawn_service(svc: FakeService) -> String {
    let app = Router::new()
        .route("/exports", post(submit))
        .route("/exports/{id}", get(status))
        .route("/files/{file}", get(download))
        .with_state(svc);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn options(work_dir: &std::path::Path) -> ExportOptions {
    ExportOptions {
        poll_interval: Duration::from_millis(10),
        max_poll_interval: Duration::from_millis(20),
        deadline: Duration::from_secs(5),
        work_dir: work_dir.to_path_buf(),
        ..ExportOptions::default()
    }
}

fn request() -> AcquisitionRequest {
    let geometry = AoiPolygon::from_rings(vec![vec![
        [-70.65, -33.45],
        [-70.60, -33.45],
        [-70.60, -33.40],
        [-70.65, -33.45],
    ]])
    .unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
    AcquisitionRequest::new("vineyard-3", geometry, DateWindow::ending_at(end, 7), "t2")
}

async fn gateway(outcome: Outcome, opts: ExportOptions) -> (HttpExportGateway, FakeService) {
    let svc = FakeService::new(outcome);
    let base = spawn_service(svc.clone()).await;
    let http = HttpClient::new(Duration::from_secs(5), 1).unwrap();
    let gw = HttpExportGateway::new(base, http, Box::new(BearerToken::new("tok")), opts);
    (gw, svc)
}

#[tokio::test]
async fn completed_export_is_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let (gw, svc) = gateway(Outcome::Completed, options(dir.path())).await;

    let outcome = gw.acquire(&request()).await.unwrap();
    let expected = dir.path().join(request().file_name());
    assert!(request().file_name().starts_with("vineyard-3_"));
    assert_eq!(outcome, Acquisition::Image(expected.clone()));

    let image = read_band_image(&expected).unwrap();
    assert_eq!(image.shape(), (4, 8, 8));

    assert_eq!(svc.last_auth.lock().unwrap().as_deref(), Some("Bearer tok"));
    let body = svc.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["start_date"], "2024-06-18");
    assert_eq!(body["end_date"], "2024-07-25");
    assert_eq!(body["bands"], json!(["B4", "B3", "B2", "B8"]));
    assert!(svc.polls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn occluded_window_reports_no_valid_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let (gw, _svc) = gateway(Outcome::NoValidPixels, options(dir.path())).await;

    let outcome = gw.acquire(&request()).await.unwrap();
    assert_eq!(outcome, Acquisition::NoValidPixels);
    assert!(!dir.path().join(request().file_name()).exists());
}

#[tokio::test]
async fn failed_job_carries_message() {
    let dir = tempfile::tempdir().unwrap();
    let (gw, _svc) = gateway(Outcome::Failed, options(dir.path())).await;

    match gw.acquire(&request()).await {
        Err(CloudError::ExportFailed { job_id, message }) => {
            assert_eq!(job_id, "job-1");
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected ExportFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn stuck_job_hits_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ExportOptions {
        deadline: Duration::from_millis(150),
        ..options(dir.path())
    };
    let (gw, _svc) = gateway(Outcome::NeverFinishes, opts).await;

    let err = gw.acquire(&request()).await.unwrap_err();
    assert!(matches!(err, CloudError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn rejected_token_is_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gw, _svc) = gateway(Outcome::Unauthorized, options(dir.path())).await;

    let err = gw.acquire(&request()).await.unwrap_err();
    assert!(matches!(err, CloudError::Auth(_)), "got {err:?}");
}
