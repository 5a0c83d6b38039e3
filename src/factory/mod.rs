//! Worker factories.
//!
//! A factory turns a prepared, unstarted OS command into a live worker that
//! has passed the PID handshake and sits in the `Ready` state. Two
//! implementations exist: [`PipeFactory`] drives the child over its own
//! stdio, [`SocketFactory`] waits for the child to dial back on a pre-bound
//! listener.

mod handshake;
mod pipe;
mod socket;

pub use pipe::PipeFactory;
pub use socket::SocketFactory;

use std::time::Duration;

use tokio::process::Command;

use crate::error::Result;
use crate::process::Process;

/// Wraps a prepared command into a ready worker process.
///
/// The command must not be started; the factory owns the full boot
/// sequence including the handshake. On any failure the child is killed
/// before the error surfaces.
pub trait Factory: Send + Sync {
    /// Spawn a worker under the factory's configured timeout.
    fn spawn_worker(
        &self,
        cmd: Command,
    ) -> impl std::future::Future<Output = Result<Process>> + Send;

    /// Spawn a worker under the caller's deadline. The factory timeout
    /// still applies; the shorter of the two wins.
    fn spawn_worker_with_timeout(
        &self,
        cmd: Command,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<Process>> + Send;

    /// Stop the factory and release what it owns (accept loop, listener).
    fn close(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
