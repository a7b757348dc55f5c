//! Compat router tests over a real listener. The bridge URL points at a
//! closed port so warmup fails fast and the validation paths are exercised.

use std::sync::Arc;
use std::time::Duration;

use warp_compat::settings::CompatSettings;
use warp_compat::{router, AppState};

fn test_settings() -> CompatSettings {
    CompatSettings {
        bridge_base_url: "http://127.0.0.1:9".to_string(),
        init_retries: 1,
        init_delay: Duration::from_millis(1),
        warmup_retries: 1,
        warmup_delay: Duration::from_millis(1),
    }
}

async fn spawn_compat() -> String {
    let state = Arc::new(AppState::new(test_settings()).unwrap());
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let base = spawn_compat().await;
    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn models_lists_unique_ids() {
    let base = spawn_compat().await;
    let resp = reqwest::get(format!("{base}/v1/models")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["object"], "list");
    let data = body["data"].as_array().unwrap();
    assert!(data.iter().any(|m| m["id"] == "auto"));
    assert!(data.iter().all(|m| m["object"] == "model"));
}

#[tokio::test]
async fn empty_messages_is_rejected() {
    let base = spawn_compat().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({"messages": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("messages"));
}

#[tokio::test]
async fn unreachable_bridge_maps_to_502() {
    let base = spawn_compat().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "stream": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("bridge_unreachable"));
}
