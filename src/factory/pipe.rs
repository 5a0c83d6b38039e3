//! Pipes factory: workers over child stdio.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{handshake, Factory};
use crate::error::{Error, Result};
use crate::process::Process;
use crate::state::State;

/// Spawns workers attached to their own stdin/stdout pipe pair.
#[derive(Debug, Clone)]
pub struct PipeFactory {
    spawn_timeout: Duration,
}

impl PipeFactory {
    /// A factory whose handshakes are bounded by `spawn_timeout`.
    pub fn new(spawn_timeout: Duration) -> Self {
        Self { spawn_timeout }
    }

    async fn spawn(&self, mut cmd: Command, limit: Duration) -> Result<Process> {
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());

        let process = Process::new(cmd);
        process.start().await?;

        match tokio::time::timeout(limit, ready_handshake(&process)).await {
            Ok(Ok(())) => {
                process.state().set(State::Ready);
                tracing::debug!(pid = process.pid(), "worker ready (pipes)");
                Ok(process)
            }
            Ok(Err(err)) => {
                let _ = process.kill().await;
                Err(err)
            }
            Err(_elapsed) => {
                let _ = process.kill().await;
                Err(Error::Spawn("context deadline exceeded".into()))
            }
        }
    }
}

/// Receive the child's PID claim over the pipe relay, validate it against
/// the spawned PID, and send the certifying reply.
async fn ready_handshake(process: &Process) -> Result<()> {
    let mut guard = process.relay().lock().await;
    let relay = guard
        .as_mut()
        .ok_or_else(|| Error::Spawn("no relay attached after start".into()))?;

    let claimed = handshake::receive_pid(relay)
        .await
        .map_err(|err| Error::Spawn(format!("handshake failed: {err}")))?;
    if claimed != process.pid() {
        return Err(Error::Spawn(format!(
            "pid mismatch: child claims {claimed}, spawned {}",
            process.pid()
        )));
    }
    handshake::send_pid(relay, claimed)
        .await
        .map_err(|err| Error::Spawn(format!("handshake reply failed: {err}")))
}

impl Factory for PipeFactory {
    async fn spawn_worker(&self, cmd: Command) -> Result<Process> {
        self.spawn(cmd, self.spawn_timeout).await
    }

    async fn spawn_worker_with_timeout(&self, cmd: Command, timeout: Duration) -> Result<Process> {
        self.spawn(cmd, timeout.min(self.spawn_timeout)).await
    }

    async fn close(&self) -> Result<()> {
        // nothing owned beyond the children already handed out
        Ok(())
    }
}
