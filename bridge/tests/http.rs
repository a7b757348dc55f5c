//! Bridge router tests over a real listener (bind 127.0.0.1:0, drive with
//! reqwest). No upstream traffic: the cases stop at validation.

use std::sync::Arc;

use warp_bridge::auth::CredentialManager;
use warp_bridge::client::UpstreamClient;
use warp_bridge::{router, AppState};

async fn spawn_bridge() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let creds = Arc::new(CredentialManager::new(dir.path().join(".env")).unwrap());
    let upstream = UpstreamClient::new(creds.clone()).unwrap();
    let state = Arc::new(AppState { upstream, creds });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), dir)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (base, _dir) = spawn_bridge().await;
    let resp = reqwest::get(format!("{base}/healthz")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "warp-bridge");
}

#[tokio::test]
async fn unknown_message_type_is_rejected() {
    let (base, _dir) = spawn_bridge().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/warp/send_stream"))
        .json(&serde_json::json!({
            "json_data": {},
            "message_type": "warp.multi_agent.v1.Bogus",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("unknown message type"));
}

#[tokio::test]
async fn send_stream_requires_json_data() {
    let (base, _dir) = spawn_bridge().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/warp/send_stream"))
        .json(&serde_json::json!({"message_type": "warp.multi_agent.v1.Request"}))
        .send()
        .await
        .unwrap();
    // Missing json_data fails body deserialization.
    assert_eq!(resp.status(), 422);
}
