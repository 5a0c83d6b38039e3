//! Worker process ownership and lifecycle.
//!
//! A [`Process`] owns one child OS process and the single relay attached to
//! it. The child itself lives on a monitor task spawned by [`Process::start`];
//! `stop`, `kill`, and `wait` talk to that task through channels, so all of
//! them may run concurrently with an in-flight exec. An exec caller observes
//! the death of the child as a relay error when its stdio closes.
//!
//! State transitions on exit:
//! `Stopping → Stopped`, `Killing → Killed`, otherwise a clean exit lands in
//! `Stopped` and a crash in `Errored`. Terminal states are never overwritten.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use crate::error::{Error, Result};
use crate::protocol::{flags, Frame, VERSION_1};
use crate::relay::pipe;
use crate::relay::Relay;
use crate::state::{State, WorkerState};

/// How long a graceful stop waits for the child before escalating to kill.
pub const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle notifications published on the process event bus.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// The child exited; `code` is `None` when it was signalled.
    Exited { pid: u32, code: Option<i32> },
    /// The child was killed by the host.
    Killed { pid: u32 },
}

/// Terminal observation of the child, published by the monitor task.
#[derive(Debug, Clone)]
pub(crate) enum ExitOutcome {
    Exited(ExitStatus),
    WaitFailed(String),
}

#[derive(Debug)]
struct ProcessInner {
    cmd: std::sync::Mutex<Option<Command>>,
    pid: AtomicU32,
    created: Instant,
    state: WorkerState,
    relay: Mutex<Option<Relay>>,
    kill_tx: mpsc::Sender<()>,
    kill_rx: std::sync::Mutex<Option<mpsc::Receiver<()>>>,
    exit_tx: std::sync::Mutex<Option<watch::Sender<Option<ExitOutcome>>>>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
    events: broadcast::Sender<WorkerEvent>,
}

/// Cheap clonable handle over one worker process.
#[derive(Debug, Clone)]
pub struct Process {
    inner: Arc<ProcessInner>,
}

impl Process {
    /// Construct an `Inactive` process around a prepared, unstarted command.
    pub fn new(cmd: Command) -> Self {
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ProcessInner {
                cmd: std::sync::Mutex::new(Some(cmd)),
                pid: AtomicU32::new(0),
                created: Instant::now(),
                state: WorkerState::new(),
                relay: Mutex::new(None),
                kill_tx,
                kill_rx: std::sync::Mutex::new(Some(kill_rx)),
                exit_tx: std::sync::Mutex::new(Some(exit_tx)),
                exit_rx,
                events,
            }),
        }
    }

    /// OS process id; 0 until started.
    #[inline]
    pub fn pid(&self) -> u32 {
        self.inner.pid.load(Ordering::SeqCst)
    }

    /// Creation instant of this handle.
    #[inline]
    pub fn created(&self) -> Instant {
        self.inner.created
    }

    /// The worker's state variable and counters.
    #[inline]
    pub fn state(&self) -> &WorkerState {
        &self.inner.state
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.inner.events.subscribe()
    }

    /// The exclusive relay slot. Exec and control-frame senders lock it;
    /// attaching a second relay replaces the first.
    pub fn relay(&self) -> &Mutex<Option<Relay>> {
        &self.inner.relay
    }

    /// Attach the relay this process talks through.
    pub async fn attach_relay(&self, relay: Relay) {
        *self.inner.relay.lock().await = Some(relay);
    }

    /// Launch the OS command, record the PID, and hand the child to the
    /// monitor task. If the command's stdio was piped, a pipe relay is
    /// built from the child's handles and attached.
    pub async fn start(&self) -> Result<()> {
        let mut cmd = self
            .inner
            .cmd
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Spawn("process already started".into()))?;

        let mut child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| Error::Spawn("spawned child has no pid".into()))?;
        self.inner.pid.store(pid, Ordering::SeqCst);

        if child.stdin.is_some() && child.stdout.is_some() {
            let relay = pipe::relay_from_child(&mut child)?;
            *self.inner.relay.lock().await = Some(relay);
        }

        let mut kill_rx = self
            .inner
            .kill_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Spawn("process already started".into()))?;
        let exit_tx = self
            .inner
            .exit_tx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Spawn("process already started".into()))?;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                res = child.wait() => match res {
                    Ok(status) => ExitOutcome::Exited(status),
                    Err(err) => ExitOutcome::WaitFailed(err.to_string()),
                },
                _ = kill_rx.recv() => {
                    let _ = child.start_kill();
                    match child.wait().await {
                        Ok(status) => ExitOutcome::Exited(status),
                        Err(err) => ExitOutcome::WaitFailed(err.to_string()),
                    }
                }
            };

            match inner.state.value() {
                State::Stopping => {
                    inner.state.set(State::Stopped);
                }
                State::Killing => {
                    inner.state.set(State::Killed);
                }
                st if !st.is_terminal() => {
                    let clean = matches!(&outcome, ExitOutcome::Exited(s) if s.success());
                    inner
                        .state
                        .set(if clean { State::Stopped } else { State::Errored });
                }
                _ => {}
            }

            tracing::debug!(pid, state = %inner.state.value(), "worker exited");
            let code = match &outcome {
                ExitOutcome::Exited(status) => status.code(),
                ExitOutcome::WaitFailed(_) => None,
            };
            let _ = inner.events.send(WorkerEvent::Exited { pid, code });
            let _ = exit_tx.send(Some(outcome));
        });

        tracing::debug!(pid, "worker started");
        Ok(())
    }

    /// Block until the child exits. Returns the underlying OS error for an
    /// unsuccessful exit.
    pub async fn wait(&self) -> Result<()> {
        match self.await_exit().await {
            ExitOutcome::Exited(status) if status.success() => Ok(()),
            ExitOutcome::Exited(status) => Err(Error::ChildExit(status)),
            ExitOutcome::WaitFailed(msg) => Err(Error::Io(std::io::Error::other(msg))),
        }
    }

    /// Gracefully stop the worker: send a `CONTROL|STOP` frame, then wait
    /// for the child to exit within [`GRACEFUL_STOP_TIMEOUT`]. A send
    /// failure or an overrun deadline escalates to [`Process::kill`].
    /// A no-op `Ok` when the worker is already gone.
    pub async fn stop(&self) -> Result<()> {
        if self.state().value().is_terminal() {
            return Ok(());
        }
        self.inner.state.set(State::Stopping);

        let graceful = async {
            let sent = {
                let mut guard = self.inner.relay.lock().await;
                match guard.as_mut() {
                    Some(relay) => relay.send(&stop_frame()?).await,
                    None => Err(Error::network("no relay attached")),
                }
            };
            match sent {
                Ok(()) => {
                    self.await_exit().await;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        };

        match tokio::time::timeout(GRACEFUL_STOP_TIMEOUT, graceful).await {
            Ok(Ok(())) => {
                self.inner.state.set(State::Stopped);
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::debug!(pid = self.pid(), %err, "stop frame failed, killing");
                self.kill().await
            }
            Err(_elapsed) => {
                tracing::debug!(pid = self.pid(), "graceful stop timed out, killing");
                self.kill().await
            }
        }
    }

    /// Signal the child unconditionally and wait until the OS reaps it.
    /// Leaves the state `Killed` (sticky). A no-op `Ok` when the worker is
    /// already gone.
    pub async fn kill(&self) -> Result<()> {
        if self.state().value().is_terminal() {
            return Ok(());
        }
        self.inner.state.set(State::Killing);

        if self.pid() == 0 {
            // never started; nothing to reap
            self.inner.state.set(State::Killed);
            return Ok(());
        }

        let _ = self.inner.kill_tx.try_send(());
        self.await_exit().await;
        self.inner.state.set(State::Killed);
        let _ = self
            .inner
            .events
            .send(WorkerEvent::Killed { pid: self.pid() });
        Ok(())
    }

    /// Resolve once the monitor has observed the child's exit.
    pub(crate) async fn await_exit(&self) -> ExitOutcome {
        let mut rx = self.inner.exit_rx.clone();
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return ExitOutcome::WaitFailed("process monitor dropped".into());
            }
        }
    }
}

/// Graceful-stop command document.
#[derive(serde::Serialize)]
struct StopCommand {
    stop: bool,
}

/// Graceful-stop command: a control frame carrying `{"stop": true}`.
fn stop_frame() -> Result<Frame> {
    let body = serde_json::to_vec(&StopCommand { stop: true })?;
    let mut fr = Frame::new();
    fr.write_version(VERSION_1);
    fr.write_flags(flags::CONTROL | flags::STOP);
    fr.write_payload_len(body.len() as u32);
    fr.write_payload(&body);
    fr.write_crc();
    Ok(fr)
}
