//! HTTP surface exercised through the router without a socket.
#![cfg(feature = "sim")]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use capacity_dichotomy::api;
use capacity_dichotomy::config::{Config, DichotomyConfig, ServerConfig, SolverConfig, SolverMode};
use capacity_dichotomy::controller::AppState;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn config(simulated_latency_ms: u64) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 30,
            retained_runs: 16,
        },
        solver: SolverConfig {
            mode: SolverMode::Simulated,
            base_url: String::new(),
            timeout_seconds: 0,
            connect_timeout_seconds: 5,
            simulated_latency_ms,
            divergence_threshold_mw: 50_000.0,
        },
        dichotomy: DichotomyConfig {
            precision_mw: 50.0,
            min_value_mw: 0.0,
            max_value_mw: 19_999.0,
            step_mw: 650.0,
            max_bracket_steps: 16,
        },
    }
}

fn app(simulated_latency_ms: u64) -> Router {
    api::router(AppState::new(config(simulated_latency_ms)).unwrap())
}

fn capacity_request() -> Value {
    json!({
        "network": {
            "id": "20240110_0830_cse",
            "constraints": {
                "branches": [{
                    "id": "CH-IT Lavorgo",
                    "base_flow_mw": 500.0,
                    "max_flow_mw": 1500.0,
                    "ptdf": { "CH": 0.8 },
                    "remedial_relief_mw": 200.0
                }]
            }
        },
        "reference_zone": "IT",
        "splitting_factors": { "FR": 0.6, "CH": 0.4 },
        "seed_index": 2000.0
    })
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_and_health() {
    let response = app(0).oneshot(get("/api/v1/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(0).oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["solver"]["mode"], "simulated");
    assert_eq!(body["solver"]["backend"], "simulated");
}

#[tokio::test]
async fn compute_returns_report() {
    let response = app(0)
        .oneshot(post("/api/v1/runs/compute", &capacity_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let result = &body["data"]["result"];
    let value = result["final_value"].as_f64().unwrap();
    assert!(value > 3700.0 && value <= 3750.0 + 1e-6);
    assert_eq!(result["limiting_cause"], "CRITICAL_BRANCH");
    assert_eq!(result["limiting_element"]["id"], "CH-IT Lavorgo");
    assert!(body["data"]["shifts_at_final_value"]["IT"].as_f64().unwrap() < 0.0);
}

#[tokio::test]
async fn invalid_splitting_factors_are_bad_request() {
    let mut request = capacity_request();
    request["splitting_factors"] = json!({ "FR": 0.6, "CH": 0.6 });

    let response = app(0).oneshot(post("/api/v1/runs/compute", &request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["kind"], "CONFIGURATION");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let response = app(0)
        .oneshot(post("/api/v1/runs", &json!({ "reference_zone": "IT" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let response = app(0)
        .oneshot(get("/api/v1/runs/4f6d2a47-5c55-4c0e-9a39-2a9d3c1f0b11"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn submitted_run_can_be_interrupted() {
    let app = app(5_000);

    let response = app
        .clone()
        .oneshot(post("/api/v1/runs", &capacity_request()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let run_id = json_body(response).await["data"]["run_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post(&format!("/api/v1/runs/{run_id}/interrupt"), &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["interrupted"], true);

    let mut state = Value::Null;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/runs/{run_id}")))
            .await
            .unwrap();
        state = json_body(response).await["data"].clone();
        if state["state"] == "COMPLETED" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(state["state"], "COMPLETED");
    assert_eq!(state["report"]["result"]["limiting_cause"], "INTERRUPTED");
    assert_eq!(state["report"]["error"]["kind"], "INTERRUPTION");
}
