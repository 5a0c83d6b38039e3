//! PID handshake frames.
//!
//! The first frame on any new worker connection is a `CONTROL` frame whose
//! payload is the JSON document `{"pid": N}` with the child's own process
//! id. The host validates the claim against the PID it spawned and replies
//! with the same document, also `CONTROL`-flagged. Only then is the worker
//! considered paired.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{flags, Frame, VERSION_1};
use crate::relay::Relay;

/// Handshake document exchanged in both directions.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Pid {
    pub pid: u32,
}

/// Read the child's greeting frame and return its claimed PID.
pub(crate) async fn receive_pid(relay: &mut Relay) -> Result<u32> {
    let mut frame = Frame::new();
    relay.receive(&mut frame).await?;

    if !flags::has_flag(frame.flags(), flags::CONTROL) {
        return Err(Error::Spawn(
            "handshake frame is not a control frame".into(),
        ));
    }
    let doc: Pid = serde_json::from_slice(frame.payload())
        .map_err(|err| Error::Spawn(format!("malformed handshake payload: {err}")))?;
    Ok(doc.pid)
}

/// Certify the pairing by echoing the PID back to the child.
pub(crate) async fn send_pid(relay: &mut Relay, pid: u32) -> Result<()> {
    let body = serde_json::to_vec(&Pid { pid })?;
    let mut frame = Frame::new();
    frame.write_version(VERSION_1);
    frame.write_flags(flags::CONTROL);
    frame.write_payload_len(body.len() as u32);
    frame.write_payload(&body);
    frame.write_crc();
    relay.send(&frame).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_document_roundtrip() {
        let body = serde_json::to_vec(&Pid { pid: 4242 }).unwrap();
        assert_eq!(body, br#"{"pid":4242}"#);
        let doc: Pid = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc.pid, 4242);
    }

    #[test]
    fn test_pid_document_rejects_garbage() {
        assert!(serde_json::from_slice::<Pid>(b"failboot").is_err());
        assert!(serde_json::from_slice::<Pid>(b"{}").is_err());
    }
}
