//! # wirepool
//!
//! Worker-process IPC core for a polyglot application server: spawn
//! long-running external interpreter processes, certify them with a PID
//! handshake, and dispatch request/response payloads over a framed binary
//! relay. Each worker serves one call at a time; a pool built on top of
//! this crate provides admission and sizing.
//!
//! ## Architecture
//!
//! - **Protocol**: self-describing frames (version, flags, options,
//!   payload length, CRC) carrying `{context, body, codec}` payloads.
//! - **Relay**: one-frame-at-a-time duplex transport over the child's
//!   stdio or an accepted TCP/UNIX connection.
//! - **Process**: owns the child OS process and its relay; `start`,
//!   `wait`, `stop`, `kill` may run concurrently with an in-flight exec.
//! - **SyncWorker**: the executor; pooled frames, buffers, and result
//!   channels; `exec` and deadline-bound `exec_with_ttl`.
//! - **Factories**: pipes (stdio) and socket (dial-back, PID-matched)
//!   boot sequences ending in a `Ready` worker.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use tokio::process::Command;
//! use wirepool::{Factory, Payload, PipeFactory, SyncWorker};
//!
//! #[tokio::main]
//! async fn main() -> wirepool::Result<()> {
//!     let factory = PipeFactory::new(Duration::from_secs(5));
//!     let process = factory.spawn_worker(Command::new("php-worker")).await?;
//!     let worker = SyncWorker::from(process);
//!
//!     let response = worker.exec(&Payload::from_body(&b"hello"[..])).await?;
//!     println!("{response}");
//!
//!     worker.stop().await
//! }
//! ```

pub mod codec;
pub mod error;
pub mod factory;
pub mod payload;
pub mod pool;
pub mod process;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod worker;

pub use error::{Error, Result};
pub use factory::{Factory, PipeFactory, SocketFactory};
pub use payload::Payload;
pub use process::{Process, WorkerEvent, GRACEFUL_STOP_TIMEOUT};
pub use relay::{Listener, Relay, Stream, StreamRelay};
pub use state::{State, WorkerState};
pub use worker::SyncWorker;
