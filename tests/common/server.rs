//! Test server management.
//!
//! Spawns and manages `malefircd` instances for integration testing.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use tokio::time::sleep;

/// A test server instance, configured over `IRC_*` env vars per §6.
pub struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    /// Spawn a new test server bound to `port`, backed by the in-memory store.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, &[]).await
    }

    /// Spawn with extra `IRC_*` env var overrides (e.g. a MOTD file path).
    pub async fn spawn_with(port: u16, extra_env: &[(&str, &str)]) -> anyhow::Result<Self> {
        let cargo_manifest_dir = env!("CARGO_MANIFEST_DIR");
        let binary_path = PathBuf::from(cargo_manifest_dir).join("target/debug/malefircd");

        let mut cmd = Command::new(&binary_path);
        cmd.env("IRC_SERVER_NAME", "test.irc.local")
            .env("IRC_PORT", port.to_string())
            .env("IRC_TLS_ENABLED", "false")
            .env("IRC_STORE", "memory")
            .env("IRC_OPER_NAME", "testop")
            .env("IRC_OPER_PASSWORD", "testpass")
            .env("IRC_LOG_FORMAT", "pretty");
        for (k, v) in extra_env {
            cmd.env(k, v);
        }
        let child = cmd.spawn()?;

        let server = Self { child, port };
        server.wait_until_ready().await?;
        Ok(server)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server failed to start within 5 seconds")
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub async fn connect(&self, nick: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.address(), nick).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
