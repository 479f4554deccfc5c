//! Cancellation-aware wrappers over blocking byte streams.
//!
//! The underlying primitives ([`std::io::Read`] and [`std::io::Write`])
//! offer no cancellation hook, so every operation here delegates the
//! blocking call to a `spawn_blocking` worker that reports through a
//! capacity-one slot, and the caller races that slot against the session's
//! cancellation token. When cancellation wins the worker is *not* killed:
//! it stays parked on the primitive (holding the stream lock) until the
//! stream itself unblocks, and its result is discarded. That is a deliberate
//! trade of resource tidiness for prompt, deadlock-free cancellation; at
//! most one worker per outstanding blocking call can persist, and stream
//! owners that cannot tolerate a straggler must close the underlying stream
//! on shutdown.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, IoPhase, Result};

/// Upper bound on bytes consumed by one run-loop read.
pub const READ_CHUNK: usize = 512;

pub(crate) type SharedReader = Arc<Mutex<BufReader<Box<dyn Read + Send>>>>;
pub(crate) type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;
pub(crate) type SharedPrefix = Arc<Mutex<Vec<u8>>>;

pub(crate) fn shared_reader(input: Box<dyn Read + Send>) -> SharedReader {
    Arc::new(Mutex::new(BufReader::new(input)))
}

pub(crate) fn shared_writer(output: Box<dyn Write + Send>) -> SharedWriter {
    Arc::new(Mutex::new(output))
}

/// Cancellable handle to a session's byte streams.
///
/// Cloneable; a clone rides along with every dispatched line so engines can
/// read further input or write output mid-command. Writes prepend the
/// session's current prefix. Concurrent `set_prefix` and `write` calls are
/// not synchronized by the core and must be serialized by the caller.
#[derive(Clone)]
pub struct SessionIo {
    token: CancellationToken,
    input: SharedReader,
    output: SharedWriter,
    prefix: SharedPrefix,
}

impl SessionIo {
    pub(crate) fn new(
        token: CancellationToken,
        input: SharedReader,
        output: SharedWriter,
        prefix: SharedPrefix,
    ) -> Self {
        Self {
            token,
            input,
            output,
            prefix,
        }
    }

    /// The current line prefix.
    pub fn prefix(&self) -> Vec<u8> {
        self.prefix.lock().unwrap().clone()
    }

    /// Replace the line prefix.
    ///
    /// Engines may call this mid-command, e.g. to blank the prompt while
    /// rendering multi-line output, and restore it afterwards.
    pub fn set_prefix(&self, prefix: impl Into<Vec<u8>>) {
        *self.prefix.lock().unwrap() = prefix.into();
    }

    /// One bounded raw read of at most `max` bytes.
    ///
    /// An empty result is end-of-input. Returns [`Error::Cancelled`] as soon
    /// as the session token fires, regardless of whether the underlying
    /// stream ever returns.
    pub async fn read(&self, max: usize) -> Result<Vec<u8>> {
        let input = Arc::clone(&self.input);
        self.race(IoPhase::Read, move || {
            let mut buf = vec![0u8; max];
            let n = input.lock().unwrap().read(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        })
        .await
    }

    /// Read up to and including the next newline, bounded by [`READ_CHUNK`].
    ///
    /// An empty result is end-of-input; a result without a trailing newline
    /// is either a final unterminated line or an over-long line split at the
    /// bound.
    pub async fn read_line(&self) -> Result<Vec<u8>> {
        let input = Arc::clone(&self.input);
        self.race(IoPhase::Read, move || {
            let mut line = Vec::new();
            let mut guard = input.lock().unwrap();
            let mut limited = (&mut *guard).take(READ_CHUNK as u64);
            limited.read_until(b'\n', &mut line)?;
            Ok(line)
        })
        .await
    }

    /// Write the prefix followed by `bytes`, returning the payload length.
    pub async fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut payload = self.prefix();
        payload.extend_from_slice(bytes);
        self.write_bytes(payload, IoPhase::Write).await
    }

    /// Write `bytes` without the prefix.
    pub async fn write_raw(&self, bytes: &[u8]) -> Result<usize> {
        self.write_bytes(bytes.to_vec(), IoPhase::Write).await
    }

    /// Write the bare prefix at the top of a run-loop iteration.
    pub(crate) async fn write_prefix(&self) -> Result<usize> {
        let payload = self.prefix();
        self.write_bytes(payload, IoPhase::Prefix).await
    }

    /// Write the trailing newline that closes a graceful run.
    ///
    /// Not raced against the token: by the time this runs the session is
    /// already stopping, and the newline should land even when the stop was
    /// caused by cancellation.
    pub(crate) async fn write_newline(&self) -> Result<usize> {
        let output = Arc::clone(&self.output);
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(write_all(&output, b"\n"));
        });
        match rx.await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(Error::io(IoPhase::Newline, e)),
            Err(_) => Err(Error::Cancelled),
        }
    }

    async fn write_bytes(&self, payload: Vec<u8>, phase: IoPhase) -> Result<usize> {
        let output = Arc::clone(&self.output);
        self.race(phase, move || write_all(&output, &payload)).await
    }

    /// Run a blocking stream operation on a worker, racing completion
    /// against the session token.
    async fn race<T, F>(&self, phase: IoPhase, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> std::io::Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let _ = tx.send(op());
        });
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!("{phase} cancelled; worker left parked on the stream");
                Err(Error::Cancelled)
            }
            res = rx => match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(Error::io(phase, e)),
                Err(_) => Err(Error::Cancelled),
            },
        }
    }
}

fn write_all(output: &SharedWriter, payload: &[u8]) -> std::io::Result<usize> {
    let mut guard = output.lock().unwrap();
    guard.write_all(payload)?;
    guard.flush()?;
    Ok(payload.len())
}
