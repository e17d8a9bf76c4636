use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tower::ServiceExt;

use testdrive::api::stream::{EVENT_ERROR, EVENT_UPDATE, open_stream};
use testdrive::api::{AppState, router};
use testdrive::config::ServiceConfig;
use testdrive::publish::StatusPublisher;
use testdrive::store::RunStore;
use testdrive::types::{RunId, RunStatus};
use testdrive_test_utils::builders::{fast_stream_settings, test_config};
use testdrive_test_utils::jobs::ScriptedJob;
use testdrive_test_utils::readers::FlakyReader;
use testdrive_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn simulation_app() -> (AppState, Router) {
    let cfg = test_config();
    let state = AppState::with_simulation(&cfg);
    let app = router(state.clone(), &cfg.server.cors_origins);
    (state, app)
}

fn scripted_app(cfg: &ServiceConfig, job: &ScriptedJob) -> (AppState, Router) {
    let state = AppState::new(cfg, job.clone().into_job());
    let app = router(state.clone(), &cfg.server.cors_origins);
    (state, app)
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Result<(StatusCode, Vec<u8>), Box<dyn Error>> {
    let request = Request::builder().method(method).uri(uri).body(body)?;
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn get_json(app: &Router, uri: &str) -> Result<(StatusCode, Value), Box<dyn Error>> {
    let (status, bytes) = send(app, Method::GET, uri, Body::empty()).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

async fn post_json(app: &Router, uri: &str, body: &str) -> Result<(StatusCode, Value), Box<dyn Error>> {
    let (status, bytes) = send(app, Method::POST, uri, Body::from(body.to_string())).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn run_id_of(body: &Value) -> Result<RunId, Box<dyn Error>> {
    let raw = body["run_id"].as_str().ok_or("run_id missing")?;
    Ok(raw.parse()?)
}

#[tokio::test]
async fn banner_and_health() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    let (status, body) = get_json(&app, "/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Experiment Dashboard API");
    assert_eq!(body["status"], "running");

    let (status, body) = get_json(&app, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
    Ok(())
}

#[tokio::test]
async fn catalog_routes() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    let (status, body) = get_json(&app, "/experiments").await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .ok_or("expected array")?
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert_eq!(
        ids,
        [
            "bank-portal-migration",
            "loan-approval-optimization",
            "customer-churn-prediction"
        ]
    );

    let (status, body) = get_json(&app, "/experiments/bank-portal-migration").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["parameters"]["sample_size"], 2500);

    let (status, body) = get_json(&app, "/experiments/nope").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Experiment not found" }));
    Ok(())
}

#[tokio::test]
async fn start_run_returns_pending_and_applies_overrides() -> TestResult {
    init_tracing();
    let (state, app) = simulation_app();

    let (status, body) = post_json(
        &app,
        "/experiments/bank-portal-migration/run",
        r#"{"sample_size": 9000, "unknown_field": true}"#,
    )
    .await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["experiment_id"], "bank-portal-migration");
    let run_id = run_id_of(&body)?;

    let results = with_timeout(async {
        loop {
            let (status, body) = get_json(&app, &format!("/experiments/run/{run_id}/results"))
                .await
                .expect("results request");
            if status == StatusCode::OK {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert_eq!(results["metrics"]["sample_size"], 9000.0);
    assert_eq!(results["run_id"], run_id.to_string());

    let (status, body) = get_json(&app, &format!("/experiments/run/{run_id}/status")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100.0);
    assert!(body["completed_at"].is_string());
    assert_eq!(state.store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn start_run_without_body_uses_defaults() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    let (status, body) = post_json(&app, "/experiments/loan-approval-optimization/run", "").await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    Ok(())
}

#[tokio::test]
async fn start_run_rejects_bad_bodies() -> TestResult {
    init_tracing();
    let (state, app) = simulation_app();

    let (status, body) = post_json(&app, "/experiments/bank-portal-migration/run", "[1, 2]").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = post_json(&app, "/experiments/bank-portal-migration/run", "{not json").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(&app, "/experiments/unknown/run", "{}").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Experiment not found");

    assert!(state.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_runs_are_404() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();
    let missing = RunId::new();

    let (status, body) = get_json(&app, &format!("/experiments/run/{missing}/status")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Run not found");

    let (status, body) = get_json(&app, &format!("/experiments/run/{missing}/results")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Results not found");

    let (status, body) = get_json(&app, "/experiments/run/not-a-uuid/status").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Run not found");

    let (status, _) = post_json(&app, &format!("/experiments/run/{missing}/cancel"), "").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn results_are_404_until_the_run_completes() -> TestResult {
    init_tracing();
    let job = ScriptedJob::new()
        .report(RunStatus::Running, 10.0, "Loading data")
        .wait();
    let gate = job.gate();
    let (state, app) = scripted_app(&test_config(), &job);

    let (_, body) = post_json(&app, "/experiments/bank-portal-migration/run", "{}").await?;
    let run_id = run_id_of(&body)?;

    let (status, body) = get_json(&app, &format!("/experiments/run/{run_id}/results")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Results not found");

    gate.release();
    with_timeout(async {
        while state.store.get_result(&run_id).is_err() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    let (status, body) = get_json(&app, &format!("/experiments/run/{run_id}/results")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metrics"]["score"], 1.0);
    Ok(())
}

#[tokio::test]
async fn cancel_route() -> TestResult {
    init_tracing();
    let job = ScriptedJob::new()
        .report(RunStatus::Running, 10.0, "Loading data")
        .wait();
    let (state, app) = scripted_app(&test_config(), &job);

    let (_, body) = post_json(&app, "/experiments/bank-portal-migration/run", "").await?;
    let run_id = run_id_of(&body)?;

    let uri = format!("/experiments/run/{run_id}/cancel");
    let (status, body) = post_json(&app, &uri, "").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["run_id"], run_id.to_string());

    let (_, body) = post_json(&app, &uri, "").await?;
    assert_eq!(body["cancelled"], false);

    with_timeout(async {
        while !state.store.get(&run_id).map(|r| r.is_terminal()).unwrap_or(false) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    let (_, body) = get_json(&app, &format!("/experiments/run/{run_id}/status")).await?;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error_message"], "Error: cancelled");
    Ok(())
}

#[tokio::test]
async fn over_capacity_is_503_and_run_is_failed() -> TestResult {
    init_tracing();
    let mut cfg = test_config();
    cfg.executor.max_concurrent_runs = 1;
    let job = ScriptedJob::new().wait();
    let gate = job.gate();
    let (state, app) = scripted_app(&cfg, &job);

    let (status, _) = post_json(&app, "/experiments/bank-portal-migration/run", "").await?;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = post_json(&app, "/experiments/bank-portal-migration/run", "").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].is_string());

    let rejected: Vec<_> = state
        .store
        .list()
        .into_iter()
        .filter(|r| r.status == RunStatus::Failed)
        .collect();
    assert_eq!(rejected.len(), 1);
    assert!(
        rejected[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Rejected:"))
    );

    gate.release();
    Ok(())
}

#[tokio::test]
async fn stream_emits_updates_then_complete() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    let (_, body) = post_json(&app, "/experiments/customer-churn-prediction/run", "").await?;
    let run_id = run_id_of(&body)?;

    let uri = format!("/experiments/run/{run_id}/stream");
    let (status, bytes) = with_timeout(send(&app, Method::GET, &uri, Body::empty())).await?;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(bytes)?;
    assert!(text.contains("event: update"), "body: {text}");
    assert!(text.contains(&format!("\"run_id\":\"{run_id}\"")));

    let complete_at = text.find("event: complete").ok_or("no complete event")?;
    assert!(text[complete_at..].contains(r#"data: {"status":"completed"}"#));
    assert!(!text[complete_at..].contains("event: update"));
    assert_eq!(text.matches("event: complete").count(), 1);
    Ok(())
}

#[tokio::test]
async fn stream_for_unknown_run_sends_one_error() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    for uri in [
        format!("/experiments/run/{}/stream", RunId::new()),
        "/experiments/run/garbage/stream".to_string(),
    ] {
        let (status, bytes) = with_timeout(send(&app, Method::GET, &uri, Body::empty())).await?;
        assert_eq!(status, StatusCode::OK);

        let text = String::from_utf8(bytes)?;
        assert_eq!(text.matches("event: error").count(), 1, "body: {text}");
        assert!(text.contains(r#"{"message":"Run not found"}"#));
        assert!(!text.contains("event: update"));
    }
    Ok(())
}

#[tokio::test]
async fn stream_read_errors_carry_a_generic_message() -> TestResult {
    init_tracing();
    let store = RunStore::new();
    let run = store.create("bank-portal-migration")?;
    let reader = Arc::new(FlakyReader::failing_after(store.clone(), 3));
    let publisher = StatusPublisher::new(reader, fast_stream_settings());

    let frames: Vec<_> =
        with_timeout(open_stream(&publisher, Some(run.run_id)).collect()).await;

    assert_eq!(frames[0].event, EVENT_UPDATE);
    let errors: Vec<_> = frames.iter().filter(|f| f.event == EVENT_ERROR).collect();
    assert_eq!(errors.len(), 5, "frames: {frames:?}");
    for frame in errors {
        assert_eq!(frame.data, json!({ "message": "Failed to read run status" }));
    }
    Ok(())
}

#[tokio::test]
async fn cors_allows_the_dashboard_origin() -> TestResult {
    init_tracing();
    let (_, app) = simulation_app();

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:8501")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:8501")
    );
    Ok(())
}

#[tokio::test]
async fn app_state_wires_one_store() {
    init_tracing();
    let (state, _) = simulation_app();
    let job = Arc::clone(&state.job);
    let run = state.store.create("bank-portal-migration").expect("create");

    state
        .executor
        .start(
            run.run_id,
            "bank-portal-migration",
            state.catalog.list()[0].config.clone(),
            job,
        )
        .expect("start");

    let run = with_timeout(async {
        loop {
            let run = state.store.get(&run.run_id).expect("run");
            if run.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(run.status, RunStatus::Completed);
}
