//! Pipe relay plumbing.
//!
//! The pipes factory runs the worker over the child's own stdio: frames go
//! out on stdin and come back on stdout. Anything the child prints to
//! stderr is left alone for the host's log collector.

use tokio::process::Child;

use crate::error::{Error, Result};
use crate::relay::Relay;

/// Take the piped stdio off a freshly spawned child and build its relay.
///
/// Fails if the command was not configured with piped stdin/stdout.
pub(crate) fn relay_from_child(child: &mut Child) -> Result<Relay> {
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Spawn("child stdin is not piped".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Spawn("child stdout is not piped".into()))?;
    Ok(Relay::pipe(stdout, stdin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    #[tokio::test]
    async fn test_relay_from_piped_child() {
        let mut cmd = Command::new("cat");
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        let mut child = cmd.spawn().unwrap();

        let relay = relay_from_child(&mut child).unwrap();
        assert!(matches!(relay, Relay::Pipe(_)));

        drop(relay); // closes stdin; cat exits
        let status = child.wait().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_relay_from_unpiped_child_fails() {
        let mut cmd = Command::new("true");
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
        let mut child = cmd.spawn().unwrap();

        let err = relay_from_child(&mut child).unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        let _ = child.wait().await;
    }
}
