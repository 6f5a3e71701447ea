mod support;

use std::time::Duration;

#[tokio::test]
async fn status_reports_a_running_session() {
    let client = reqwest::Client::new();

    let first: serde_json::Value = client
        .get(support::http_url("/status"))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("json body");
    assert!(first["player_count"].is_u64());
    assert!(first["alive_bullets"].is_u64());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let res = client
        .get(support::http_url("/status"))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let second: serde_json::Value = res.json().await.expect("json body");

    let before = first["tick"].as_u64().expect("tick");
    let after = second["tick"].as_u64().expect("tick");
    assert!(after > before, "world loop should keep ticking ({before} -> {after})");
}
