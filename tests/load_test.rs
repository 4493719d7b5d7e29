//! Load testing for the scan gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;

mod common;

use common::{engine_config, start_gateway, wait_for_idle, EICAR, EICAR_ENGINE};

#[tokio::test]
async fn test_burst_of_uploads() {
    let mut config = engine_config(EICAR_ENGINE);
    config.limits.max_concurrent_scans = Some(4);
    let gw = Arc::new(start_gateway(config).await);

    let total = 40;
    let started = Instant::now();
    let tasks: Vec<_> = (0..total)
        .map(|i| {
            let gw = gw.clone();
            tokio::spawn(async move {
                let content: &[u8] = if i % 5 == 0 { EICAR } else { b"harmless content" };
                let res = gw.upload(&format!("file-{i}.bin"), content).await;
                let status = res.status();
                let body: serde_json::Value = res.json().await.unwrap();
                (status, body["status"].as_str().map(str::to_string))
            })
        })
        .collect();

    let mut infected = 0;
    for task in tasks {
        let (status, verdict) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        if verdict.as_deref() == Some("infected") {
            infected += 1;
        }
    }

    let elapsed = started.elapsed();
    println!("{total} scans in {elapsed:?} ({:.1} scans/s)", total as f64 / elapsed.as_secs_f64());

    assert_eq!(infected, total / 5);
    assert!(elapsed < Duration::from_secs(30));
    wait_for_idle(&gw.scanner).await;
}
