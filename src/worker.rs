//! Sync executor: one call at a time over one worker process.
//!
//! [`SyncWorker`] wraps a [`Process`] with object pools for frames, scratch
//! byte buffers, and one-slot result channels, so steady-state execution
//! allocates nothing per call. Pool hygiene is part of the contract: frames
//! are reset and returned on every exit path, buffers are cleared with
//! capacity retained, and result channels are drained of stale values on
//! release.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::process::Process;
use crate::protocol::{flags, Frame, VERSION_1};
use crate::relay::Relay;
use crate::state::{State, WorkerState};

type ExecResult = Result<Payload>;

/// A reusable one-slot result channel.
struct ExecChannel {
    tx: mpsc::Sender<ExecResult>,
    rx: mpsc::Receiver<ExecResult>,
}

/// Minimal thread-safe object pool.
struct ObjectPool<T> {
    items: std::sync::Mutex<Vec<T>>,
}

impl<T> ObjectPool<T> {
    fn new() -> Self {
        Self {
            items: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn get_or(&self, make: impl FnOnce() -> T) -> T {
        self.items.lock().unwrap().pop().unwrap_or_else(make)
    }

    fn put(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

struct SyncInner {
    process: Process,
    frames: ObjectPool<Frame>,
    buffers: ObjectPool<BytesMut>,
    channels: ObjectPool<ExecChannel>,
}

/// Synchronous executor over one worker process.
///
/// Cheap to clone; all clones share the process and the pools. The caller
/// (normally the pool watcher's `take`/`release` pair) must ensure only one
/// exec is in flight per worker.
#[derive(Clone)]
pub struct SyncWorker {
    inner: Arc<SyncInner>,
}

impl From<Process> for SyncWorker {
    fn from(process: Process) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                process,
                frames: ObjectPool::new(),
                buffers: ObjectPool::new(),
                channels: ObjectPool::new(),
            }),
        }
    }
}

impl SyncWorker {
    /// The wrapped process handle.
    pub fn process(&self) -> &Process {
        &self.inner.process
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.inner.process.pid()
    }

    /// Creation instant.
    pub fn created(&self) -> std::time::Instant {
        self.inner.process.created()
    }

    /// State variable and counters.
    pub fn state(&self) -> &WorkerState {
        self.inner.process.state()
    }

    /// See [`Process::wait`].
    pub async fn wait(&self) -> Result<()> {
        self.inner.process.wait().await
    }

    /// See [`Process::stop`].
    pub async fn stop(&self) -> Result<()> {
        self.inner.process.stop().await
    }

    /// See [`Process::kill`].
    pub async fn kill(&self) -> Result<()> {
        self.inner.process.kill().await
    }

    /// See [`Process::attach_relay`].
    pub async fn attach_relay(&self, relay: Relay) {
        self.inner.process.attach_relay(relay).await;
    }

    /// Execute a payload and block until the response arrives.
    ///
    /// Requires a non-empty payload and a `Ready` worker. On success the
    /// worker returns to `Ready` unless a supervisor preempted the state
    /// mid-call, in which case the supervised state sticks.
    pub async fn exec(&self, payload: &Payload) -> Result<Payload> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        let state = self.inner.process.state();
        let current = state.value();
        if current != State::Ready {
            return Err(Error::NotReady(current));
        }
        state.set_last_used(unix_nanos());
        state.set(State::Working);

        let res = self.inner.exec_payload(payload).await;
        self.inner.settle(res)
    }

    /// Execute a payload under a deadline.
    ///
    /// The round trip runs on a background task; the caller waits for
    /// whichever fires first, result delivery or the deadline. On expiry
    /// the worker is killed and an [`Error::ExecTTL`] is returned; a kill
    /// failure is appended to the TTL error, never substituted for it.
    pub async fn exec_with_ttl(&self, ttl: Duration, payload: &Payload) -> Result<Payload> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let mut ch = self.inner.get_channel();

        // the supervisor may have condemned the worker before it started
        let state = self.inner.process.state();
        let current = state.value();
        if current != State::Ready {
            self.inner.put_channel(ch);
            return Err(Error::NotReady(current));
        }
        state.set_last_used(unix_nanos());
        state.set(State::Working);

        let inner = self.inner.clone();
        let owned = payload.clone();
        let tx = ch.tx.clone();
        tokio::spawn(async move {
            let res = inner.exec_payload(&owned).await;
            let res = inner.settle(res);
            let _ = tx.try_send(res);
        });

        let out = tokio::select! {
            res = ch.rx.recv() => {
                res.unwrap_or_else(|| Err(Error::network("exec result channel closed")))
            }
            _ = tokio::time::sleep(ttl) => {
                match self.inner.process.kill().await {
                    Ok(()) => Err(Error::ExecTTL { ttl, kill: None }),
                    Err(err) => Err(Error::ExecTTL {
                        ttl,
                        kill: Some(Box::new(err)),
                    }),
                }
            }
        };

        self.inner.put_channel(ch);
        out
    }
}

impl SyncInner {
    /// Apply the post-exec state rules and count the attempt.
    ///
    /// `SoftJob` is treated like success for state purposes: the worker
    /// goes back to `Ready` unless the supervisor moved it off `Working`.
    /// Hard errors condemn the worker to `Errored`. Every completed attempt
    /// increments the exec counter.
    fn settle(&self, res: ExecResult) -> ExecResult {
        let state = self.process.state();
        match &res {
            Ok(_) | Err(Error::SoftJob(_)) => {
                state.cas(State::Working, State::Ready);
            }
            Err(_) => {
                state.set(State::Errored);
            }
        }
        state.register_exec();
        res
    }

    async fn exec_payload(&self, payload: &Payload) -> ExecResult {
        let mut request = self.get_frame();
        let mut response = self.get_frame();
        let out = self.round_trip(&mut request, &mut response, payload).await;
        self.put_frame(request);
        self.put_frame(response);
        out
    }

    async fn round_trip(
        &self,
        request: &mut Frame,
        response: &mut Frame,
        payload: &Payload,
    ) -> ExecResult {
        request.write_version(VERSION_1);
        request.write_flags(payload.codec);

        let mut buf = self.get_buffer();
        buf.extend_from_slice(&payload.context);
        buf.extend_from_slice(&payload.body);

        // context byte-offset within the payload region
        request.write_options(payload.context.len() as u32);
        request.write_payload_len(buf.len() as u32);
        request.write_payload(&buf);
        request.write_crc();
        self.put_buffer(buf);

        {
            let mut guard = self.process.relay().lock().await;
            let relay = guard
                .as_mut()
                .ok_or_else(|| Error::network("no relay attached"))?;
            relay.send(request).await?;
            relay.receive(response).await?;
        }

        let resp_flags = response.flags();
        if flags::has_flag(resp_flags, flags::ERROR) {
            return Err(Error::SoftJob(
                String::from_utf8_lossy(response.payload()).into_owned(),
            ));
        }

        let options = response.options();
        if options.len() != 1 {
            return Err(Error::Decode(
                "options length should be equal 1 (body offset)".into(),
            ));
        }
        let off = options[0] as usize;
        let data = response.payload();
        if off > data.len() {
            return Err(Error::Decode(format!(
                "context offset {off} exceeds payload length {}",
                data.len()
            )));
        }

        // copy out of the pooled frame so it can be reset and reused
        Ok(Payload {
            context: Bytes::copy_from_slice(&data[..off]),
            body: Bytes::copy_from_slice(&data[off..]),
            codec: resp_flags & !flags::ERROR,
        })
    }

    fn get_frame(&self) -> Frame {
        self.frames.get_or(Frame::new)
    }

    fn put_frame(&self, mut frame: Frame) {
        frame.reset();
        self.frames.put(frame);
    }

    fn get_buffer(&self) -> BytesMut {
        self.buffers.get_or(BytesMut::new)
    }

    fn put_buffer(&self, mut buf: BytesMut) {
        buf.clear();
        self.buffers.put(buf);
    }

    fn get_channel(&self) -> ExecChannel {
        self.channels.get_or(|| {
            let (tx, rx) = mpsc::channel(1);
            ExecChannel { tx, rx }
        })
    }

    fn put_channel(&self, mut ch: ExecChannel) {
        // drop any stale value a late task delivered
        while ch.rx.try_recv().is_ok() {}
        self.channels.put(ch);
    }
}

fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
