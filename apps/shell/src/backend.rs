//! Native backend process.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use boop_bridge::BridgeClient;

use crate::config::BackendConfig;

/// Handle to the spawned backend. Killed on drop.
pub struct Backend {
    child: Child,
}

/// Spawns the backend with piped stdio and connects a bridge to it.
///
/// The backend's stderr is inherited so its own diagnostics stay visible.
pub fn spawn(cfg: &BackendConfig) -> anyhow::Result<(Backend, BridgeClient)> {
    let mut child = Command::new(&cfg.program)
        .args(&cfg.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start backend `{}`", cfg.program))?;

    let stdin = child.stdin.take().context("backend stdin not captured")?;
    let stdout = child.stdout.take().context("backend stdout not captured")?;

    info!(program = %cfg.program, pid = ?child.id(), "backend started");
    Ok((Backend { child }, BridgeClient::new(stdout, stdin)))
}

impl Backend {
    /// Waits up to `grace` for the backend to exit, then kills it.
    ///
    /// Close the bridge first so the backend sees end of input.
    pub async fn shutdown(mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "backend exited"),
            Ok(Err(e)) => warn!("failed to wait for backend: {e}"),
            Err(_) => {
                warn!("backend did not exit in time, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!("failed to kill backend: {e}");
                }
            }
        }
    }
}
