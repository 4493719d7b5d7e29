//! Shared utilities for integration and load testing.
//!
//! The real engine is replaced with `sh -c` scripts that mimic its exit codes
//! and output, so these tests need a Unix shell but no antivirus install.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use scan_gateway::config::ScanConfig;
use scan_gateway::http::HttpServer;
use scan_gateway::lifecycle::Shutdown;
use scan_gateway::scan::Scanner;
use tokio::task::JoinHandle;

/// Reads all input, reports clean.
pub const CLEAN_ENGINE: &str = "cat > /dev/null; exit 0";

/// Reports the EICAR test signature when the upload contains it.
pub const EICAR_ENGINE: &str = "if grep -q EICAR; then \
     echo 'stdin: Eicar-Test-Signature FOUND'; exit 1; \
     fi; exit 0";

/// Fails the way the engine does when its database is missing.
pub const CONFIG_ERROR_ENGINE: &str =
    "cat > /dev/null; echo 'LibClamAV Error: cl_load(): No such file or directory' >&2; exit 2";

/// Never finishes on its own.
pub const HUNG_ENGINE: &str = "exec sleep 30";

pub const EICAR: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Default config with the engine replaced by a shell script.
pub fn engine_config(script: &str) -> ScanConfig {
    let mut config = ScanConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.engine.program = "sh".into();
    config.engine.args = Some(vec!["-c".into(), script.into()]);
    config.limits.max_concurrent_scans = Some(2);
    config.ui.index_path = "/nonexistent/index.html".into();
    config
}

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub scanner: Arc<Scanner>,
    pub client: reqwest::Client,
    pub task: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn upload(&self, filename: &str, content: &[u8]) -> reqwest::Response {
        self.client
            .post(self.url("/scan"))
            .multipart(upload_form(filename, content))
            .send()
            .await
            .expect("gateway unreachable")
    }
}

pub async fn start_gateway(config: ScanConfig) -> TestGateway {
    let scanner = Arc::new(Scanner::new(&config));
    start_gateway_with(config, scanner).await
}

pub async fn start_gateway_with(config: ScanConfig, scanner: Arc<Scanner>) -> TestGateway {
    let listener = tokio::net::TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_scanner(config, scanner.clone());
    let server_shutdown = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestGateway {
        addr,
        shutdown,
        scanner,
        client,
        task,
    }
}

pub fn upload_form(filename: &str, content: &[u8]) -> Form {
    Form::new()
        .text("comment", "uploaded by test")
        .part("file", Part::bytes(content.to_vec()).file_name(filename.to_string()))
}

/// Poll until no scan holds a slot.
pub async fn wait_for_idle(scanner: &Scanner) {
    for _ in 0..100 {
        if scanner.limiter().outstanding() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} scans still hold a slot", scanner.limiter().outstanding());
}
