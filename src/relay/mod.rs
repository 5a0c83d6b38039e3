//! Framed duplex transports.
//!
//! A relay binds a byte-level input source and output sink and moves one
//! [`Frame`] at a time across it. [`StreamRelay`] is the generic engine over
//! any `AsyncRead`/`AsyncWrite` pair; [`Relay`] enumerates the concrete
//! transports a worker can own (child stdio, or an accepted TCP/UNIX
//! connection).
//!
//! Any short read, CRC mismatch, or I/O error degrades the relay; the
//! owning process is expected to leave `Ready` for good.

pub(crate) mod pipe;
mod socket;

pub use socket::{Listener, Stream};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp;
use tokio::process::{ChildStdin, ChildStdout};

#[cfg(unix)]
use tokio::net::unix;

use crate::error::{Error, Result};
use crate::protocol::{Frame, FIXED_PREFIX_SIZE, MAX_OPTIONS, MAX_PAYLOAD_SIZE, VERSION_1};

/// Framed transport over any byte stream pair.
///
/// `send` coalesces the whole frame into one reused scratch buffer and
/// performs a single logical write; `receive` reads the fixed prefix, the
/// declared options, and exactly the declared payload length into the
/// buffer owned by the supplied frame.
#[derive(Debug)]
pub struct StreamRelay<R, W> {
    reader: R,
    writer: W,
    scratch: BytesMut,
}

impl<R, W> StreamRelay<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Bind a read source and a write sink.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            scratch: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Write one frame: header, options, payload, flushed as a unit.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.scratch.clear();
        frame.encode_into(&mut self.scratch);
        self.writer
            .write_all(&self.scratch)
            .await
            .map_err(Error::Network)?;
        self.writer.flush().await.map_err(Error::Network)?;
        Ok(())
    }

    /// Read one frame into `frame`, validating version and CRC.
    pub async fn receive(&mut self, frame: &mut Frame) -> Result<()> {
        let mut prefix = [0u8; FIXED_PREFIX_SIZE];
        self.reader
            .read_exact(&mut prefix)
            .await
            .map_err(Error::Network)?;
        frame.set_prefix(prefix);

        if frame.version() != VERSION_1 {
            return Err(Error::network(format!(
                "unsupported frame version {}",
                frame.version()
            )));
        }

        let count = frame.options_count();
        if count > 0 {
            let mut raw = [0u8; MAX_OPTIONS * 4];
            let raw = &mut raw[..count * 4];
            self.reader.read_exact(raw).await.map_err(Error::Network)?;
            frame.set_received_options(raw);
        }

        if !frame.verify_crc() {
            return Err(Error::network("frame crc mismatch"));
        }

        let payload_len = frame.payload_len();
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(Error::Decode(format!(
                "payload length {payload_len} exceeds maximum {MAX_PAYLOAD_SIZE}"
            )));
        }
        if payload_len == 0 && count == 0 {
            return Err(Error::Decode("zero-length frame".into()));
        }

        let payload_len = payload_len as usize;
        let buf = frame.payload_mut();
        buf.resize(payload_len, 0);
        self.reader
            .read_exact(&mut buf[..])
            .await
            .map_err(Error::Network)?;
        Ok(())
    }
}

/// A worker's transport: pipes to the child's stdio or an accepted stream
/// connection. Exactly one relay is attached to a process.
#[derive(Debug)]
pub enum Relay {
    /// Child stdout in, child stdin out.
    Pipe(StreamRelay<ChildStdout, ChildStdin>),
    /// Accepted TCP connection, split.
    Tcp(StreamRelay<tcp::OwnedReadHalf, tcp::OwnedWriteHalf>),
    /// Accepted UNIX connection, split.
    #[cfg(unix)]
    Unix(StreamRelay<unix::OwnedReadHalf, unix::OwnedWriteHalf>),
}

impl Relay {
    /// Build a pipe relay over a spawned child's stdio.
    pub fn pipe(stdout: ChildStdout, stdin: ChildStdin) -> Self {
        Relay::Pipe(StreamRelay::new(stdout, stdin))
    }

    /// Build a socket relay over an accepted connection.
    pub fn from_stream(stream: Stream) -> Self {
        match stream {
            Stream::Tcp(s) => {
                let (r, w) = s.into_split();
                Relay::Tcp(StreamRelay::new(r, w))
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                let (r, w) = s.into_split();
                Relay::Unix(StreamRelay::new(r, w))
            }
        }
    }

    /// Send one frame.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        match self {
            Relay::Pipe(rl) => rl.send(frame).await,
            Relay::Tcp(rl) => rl.send(frame).await,
            #[cfg(unix)]
            Relay::Unix(rl) => rl.send(frame).await,
        }
    }

    /// Receive one frame.
    pub async fn receive(&mut self, frame: &mut Frame) -> Result<()> {
        match self {
            Relay::Pipe(rl) => rl.receive(frame).await,
            Relay::Tcp(rl) => rl.receive(frame).await,
            #[cfg(unix)]
            Relay::Unix(rl) => rl.receive(frame).await,
        }
    }
}
