//! Bounded capture of child process streams.
//!
//! Each stream is drained on its own thread so a chatty child can never block
//! on a full pipe while the parent waits on it. Bytes past the limit are read
//! and discarded rather than buffered. Collecting a stream is bounded by a
//! deadline: a descendant that keeps the pipe open cannot hold the caller.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;
use thiserror::Error;

const READ_CHUNK: usize = 8192;

/// Bytes read from a stream, plus whether the limit was exceeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// The retained bytes, at most the configured limit.
    pub bytes: Vec<u8>,
    /// Whether the stream produced more than the limit.
    pub truncated: bool,
}

/// Read `reader` to the end, retaining at most `limit` bytes.
///
/// # Errors
///
/// Propagates read errors other than interruption.
pub fn read_bounded(mut reader: impl Read, limit: usize) -> io::Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let room = limit.saturating_sub(captured.bytes.len());
        let keep = read.min(room);
        captured
            .bytes
            .extend_from_slice(chunk.get(..keep).unwrap_or_default());
        if keep < read {
            captured.truncated = true;
        }
    }
    Ok(captured)
}

/// A stream being drained on a background thread.
#[derive(Debug)]
pub struct Capture {
    result: Receiver<io::Result<Captured>>,
}

/// Why a stream could not be collected.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The stream was still open when the deadline passed.
    #[error("stream still open at the deadline")]
    Deadline,
    /// Reading the stream failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Drain `reader` on a background thread.
pub fn spawn_capture<R>(reader: R, limit: usize) -> Capture
where
    R: Read + Send + 'static,
{
    let (sender, result) = mpsc::channel();
    thread::spawn(move || {
        if sender.send(read_bounded(reader, limit)).is_err() {
            // The caller stopped waiting at its deadline.
        }
    });
    Capture { result }
}

/// Wait for a capture to reach end of stream, giving up at `deadline`.
///
/// An abandoned reader thread ends once the last writer closes the pipe.
///
/// # Errors
///
/// Returns [`CaptureError::Deadline`] when the stream is still open at
/// `deadline`, and [`CaptureError::Io`] when the reader failed or panicked.
pub fn collect_capture(
    capture: Option<Capture>,
    deadline: Instant,
) -> Result<Captured, CaptureError> {
    let Some(reader) = capture else {
        return Ok(Captured::default());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match reader.result.recv_timeout(remaining) {
        Ok(read) => Ok(read?),
        Err(RecvTimeoutError::Timeout) => Err(CaptureError::Deadline),
        Err(RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("stream reader panicked").into())
        }
    }
}
