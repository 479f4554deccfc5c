//! Shared helpers for shoal-core integration tests.
#![allow(dead_code)]

use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};

use shoal_core::{EngineHandle, engine_fn};

/// Writer appending into a shared byte buffer.
#[derive(Clone, Default)]
pub struct Sink(Arc<Mutex<Vec<u8>>>);

impl Sink {
    pub fn string(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reader that blocks until the paired sender is dropped, then reports
/// end-of-input. Stands in for a stream with no data and no cancellation
/// hook.
pub struct Stuck(mpsc::Receiver<()>);

impl Read for Stuck {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        let _ = self.0.recv();
        Ok(0)
    }
}

pub fn stuck_reader() -> (mpsc::Sender<()>, Stuck) {
    let (tx, rx) = mpsc::channel();
    (tx, Stuck(rx))
}

/// Reader fed chunk-by-chunk by the test; end-of-input when the sender
/// drops.
pub struct Feed {
    chunks: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for Feed {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.chunks.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

pub fn feed_reader() -> (mpsc::Sender<Vec<u8>>, Feed) {
    let (tx, rx) = mpsc::channel();
    (
        tx,
        Feed {
            chunks: rx,
            pending: Vec::new(),
        },
    )
}

/// Engine that counts dispatches and stops the session on the literal line
/// "quit".
pub fn counting_engine() -> (Arc<AtomicUsize>, EngineHandle) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let handle = EngineHandle::new(engine_fn(move |_token, line, _io| {
        let seen = Arc::clone(&seen);
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            if line == "quit" { 1 } else { 0 }
        }
    }));
    (count, handle)
}

/// Engine that writes each line back bracketed, so tests can tell which
/// session's stream an execution used.
pub fn bracket_engine() -> EngineHandle {
    EngineHandle::new(engine_fn(|_token, line, io| async move {
        let _ = io.write(format!("[{line}]").as_bytes()).await;
        0
    }))
}
