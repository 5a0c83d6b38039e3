//! Socket listeners and accepted streams.
//!
//! The socket factory is handed a pre-bound [`Listener`] and turns each
//! accepted [`Stream`] into a relay. TCP on any platform; UNIX domain
//! sockets where available.

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::{TcpListener, TcpStream};

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

use crate::error::Result;

/// A pre-bound listener the children dial back to.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// One accepted connection.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Listener {
    /// Bind a TCP listener.
    pub async fn bind_tcp(addr: &str) -> Result<Self> {
        Ok(Listener::Tcp(TcpListener::bind(addr).await?))
    }

    /// Bind a UNIX-domain listener, removing any stale socket file first.
    #[cfg(unix)]
    pub async fn bind_unix(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(Listener::Unix(UnixListener::bind(path)?))
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> std::io::Result<Stream> {
        match self {
            Listener::Tcp(ls) => {
                let (stream, _addr) = ls.accept().await?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(ls) => {
                let (stream, _addr) = ls.accept().await?;
                Ok(Stream::Unix(stream))
            }
        }
    }

    /// Local address of a TCP listener; `None` for UNIX sockets.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(ls) => ls.local_addr().ok(),
            #[cfg(unix)]
            Listener::Unix(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_tcp_ephemeral() {
        let ls = Listener::bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = ls.tcp_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_unix_removes_stale_socket() {
        let path = std::env::temp_dir().join(format!("wirepool-test-{}.sock", std::process::id()));
        let ls = Listener::bind_unix(&path).await.unwrap();
        drop(ls);
        // a stale file is left behind; binding again must succeed
        let ls = Listener::bind_unix(&path).await.unwrap();
        assert!(ls.tcp_addr().is_none());
        drop(ls);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_accept_hands_out_stream() {
        let ls = Listener::bind_tcp("127.0.0.1:0").await.unwrap();
        let addr = ls.tcp_addr().unwrap();

        let dial = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let accepted = ls.accept().await.unwrap();
        assert!(matches!(accepted, Stream::Tcp(_)));
        dial.await.unwrap();
    }
}
