//! Socket factory: workers that dial back on a pre-bound listener.
//!
//! Spawning is concurrent, so accept order proves nothing. Each accepted
//! connection is matched to its spawn by the PID carried in the first
//! (handshake) frame: spawners register a one-shot slot under the child's
//! PID, and a single accept loop reads the greeting eagerly and dispatches
//! the connection to that slot. A connection with no pending slot (the
//! child of a spawn that already timed out, or a stranger) is closed on
//! the spot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{handshake, Factory};
use crate::error::{Error, Result};
use crate::process::{ExitOutcome, Process};
use crate::relay::{Listener, Relay};
use crate::state::State;

type PendingMap = Arc<Mutex<HashMap<u32, oneshot::Sender<Relay>>>>;

/// Spawns workers that connect back over TCP or UNIX sockets.
#[derive(Debug)]
pub struct SocketFactory {
    spawn_timeout: Duration,
    pending: PendingMap,
    accept_handle: JoinHandle<()>,
}

impl SocketFactory {
    /// Build a factory over a pre-bound listener. The accept loop starts
    /// immediately and runs until [`Factory::close`] or drop.
    pub fn new(listener: Listener, spawn_timeout: Duration) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let accept_handle = tokio::spawn(Self::accept_loop(listener, pending.clone()));
        Self {
            spawn_timeout,
            pending,
            accept_handle,
        }
    }

    async fn accept_loop(listener: Listener, pending: PendingMap) {
        loop {
            let stream = match listener.accept().await {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::debug!(%err, "accept loop terminated");
                    break;
                }
            };

            let mut relay = Relay::from_stream(stream);
            let pid = match handshake::receive_pid(&mut relay).await {
                Ok(pid) => pid,
                Err(err) => {
                    tracing::warn!(%err, "dropping connection with bad greeting");
                    continue;
                }
            };

            let slot = pending.lock().unwrap().remove(&pid);
            match slot {
                Some(tx) => {
                    if tx.send(relay).is_err() {
                        tracing::warn!(pid, "spawn slot abandoned, closing connection");
                    }
                }
                None => {
                    tracing::warn!(pid, "no pending spawn for pid, closing connection");
                }
            }
        }
    }

    async fn spawn(&self, cmd: Command, limit: Duration) -> Result<Process> {
        let process = Process::new(cmd);
        process.start().await?;
        let pid = process.pid();

        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(pid, tx);

        let delivery = tokio::select! {
            res = rx => res
                .map_err(|_| Error::Spawn("factory closed before the worker connected".into())),
            _ = tokio::time::sleep(limit) => {
                Err(Error::Spawn("context deadline exceeded".into()))
            }
            outcome = process.await_exit() => Err(Error::Spawn(match outcome {
                ExitOutcome::Exited(status) => format!("worker exited during boot: {status}"),
                ExitOutcome::WaitFailed(msg) => format!("worker wait failed during boot: {msg}"),
            })),
        };

        match delivery {
            Ok(mut relay) => {
                if let Err(err) = handshake::send_pid(&mut relay, pid).await {
                    let _ = process.kill().await;
                    return Err(Error::Spawn(format!("handshake reply failed: {err}")));
                }
                process.attach_relay(relay).await;
                process.state().set(State::Ready);
                tracing::debug!(pid, "worker ready (socket)");
                Ok(process)
            }
            Err(err) => {
                self.pending.lock().unwrap().remove(&pid);
                let _ = process.kill().await;
                Err(err)
            }
        }
    }
}

impl Factory for SocketFactory {
    async fn spawn_worker(&self, cmd: Command) -> Result<Process> {
        self.spawn(cmd, self.spawn_timeout).await
    }

    async fn spawn_worker_with_timeout(&self, cmd: Command, timeout: Duration) -> Result<Process> {
        self.spawn(cmd, timeout.min(self.spawn_timeout)).await
    }

    async fn close(&self) -> Result<()> {
        self.accept_handle.abort();
        Ok(())
    }
}

impl Drop for SocketFactory {
    fn drop(&mut self) {
        self.accept_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_stops_accept_loop() {
        let listener = Listener::bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = listener.tcp_addr().unwrap();

        let factory = SocketFactory::new(listener, Duration::from_secs(1));
        factory.close().await.unwrap();
        // give the abort a moment to land
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the listener is gone with the loop; dialing must fail or be reset
        let dial = tokio::net::TcpStream::connect(addr).await;
        if let Ok(mut stream) = dial {
            use tokio::io::AsyncReadExt;
            let mut buf = [0u8; 1];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            assert_eq!(n, 0);
        }
    }
}
