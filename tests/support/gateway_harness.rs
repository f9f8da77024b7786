#![allow(dead_code)]

use helpline::Config;
use helpline::gateway::run_gateway_with_listener;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub struct GatewayTestServer {
    pub port: u16,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
    _workspace: TempDir,
}

/// Config pointing at a fresh SQLite file under `dir`, AI disabled.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.store.database_url = format!("sqlite://{}?mode=rwc", dir.join("helpline.db").display());
    config.ai.api_key = None;
    config
}

impl GatewayTestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let workspace = TempDir::new().expect("temp workspace should be created");
        let mut config = test_config(workspace.path());
        configure(&mut config);
        Self::spawn(config, workspace).await
    }

    /// Serve `config` as given; `workspace` is kept alive with the server.
    pub async fn spawn(config: Config, workspace: TempDir) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("listener should have a local address")
            .port();

        let handle = tokio::spawn(async move {
            run_gateway_with_listener("127.0.0.1", listener, config).await
        });

        wait_until_gateway_ready(port).await;

        Self {
            port,
            handle,
            _workspace: workspace,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn wait_until_gateway_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/api/health"))
            .send()
            .await;
        if matches!(health, Ok(resp) if resp.status() == StatusCode::OK) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    panic!("gateway on port {port} did not become ready");
}
