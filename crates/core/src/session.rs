//! Interpreter session: the front-end loop attached to a shared engine.
//!
//! A session owns an input source, an output sink, a line prefix, and a
//! signal-transform table. `run` drives the interpreter: write the prefix,
//! read one line, dispatch it to the engine's runner, repeat until the
//! session is cancelled, the engine reports a non-zero status, the input
//! ends, or a stream fails.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{self, QUEUE_CAPACITY};
use crate::engine::EngineHandle;
use crate::error::{Error, Result};
use crate::io::{self, SessionIo, SharedReader, SharedWriter};
use crate::registry::Registry;
use crate::signal::{self, Signal, SignalHandlers};

/// An interactive front-end session.
///
/// Configured with chained setters, then driven with [`Session::run`],
/// which blocks until shutdown. Each run derives a fresh child token from
/// the parent, so a session can be run again after a cancelled run.
///
/// ```rust,ignore
/// let registry = Arc::new(Registry::new());
/// let mut session = Session::new(registry)
///     .engine(EngineHandle::new(MyEngine))
///     .prefix("> ")
///     .io(std::io::stdin(), std::io::stdout());
/// session.run().await?;
/// ```
pub struct Session {
    registry: Arc<Registry>,
    engine: Option<EngineHandle>,
    prefix: Arc<Mutex<Vec<u8>>>,
    input: Option<SharedReader>,
    output: Option<SharedWriter>,
    handlers: SignalHandlers,
    parent: CancellationToken,
    signal_source: Option<mpsc::Receiver<Signal>>,
}

impl Session {
    /// Create a session bound to `registry` with no engine, an empty
    /// prefix, and stdio streams unless [`Session::io`] overrides them.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            engine: None,
            prefix: Arc::new(Mutex::new(Vec::new())),
            input: None,
            output: None,
            handlers: BTreeMap::new(),
            parent: CancellationToken::new(),
            signal_source: None,
        }
    }

    /// Attach the engine this session dispatches to.
    pub fn engine(mut self, handle: EngineHandle) -> Self {
        self.engine = Some(handle);
        self
    }

    /// Set the line prefix written before every read.
    pub fn prefix(self, prefix: impl Into<Vec<u8>>) -> Self {
        self.set_prefix(prefix);
        self
    }

    /// Set the input and output streams.
    pub fn io(
        mut self,
        input: impl Read + Send + 'static,
        output: impl Write + Send + 'static,
    ) -> Self {
        self.set_io(input, output);
        self
    }

    /// Register a transform for one signal. A transform returning an
    /// interrupt- or terminate-class signal shuts the session down; any
    /// other return value suppresses the signal.
    pub fn signal_handler(
        mut self,
        signal: Signal,
        handler: impl Fn(Signal) -> Signal + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(signal, Arc::new(handler));
        self
    }

    /// Root the session under `parent`: cancelling the parent cancels
    /// every run of this session.
    pub fn parent_token(mut self, parent: CancellationToken) -> Self {
        self.parent = parent;
        self
    }

    /// Replace the OS signal feed with a caller-supplied intake for the
    /// next run. Synthetic signals travel the same transform-and-cancel
    /// pipeline as real ones; after that run the session falls back to the
    /// OS feed.
    pub fn signal_source(mut self, intake: mpsc::Receiver<Signal>) -> Self {
        self.signal_source = Some(intake);
        self
    }

    /// Replace the line prefix. Takes effect on the next write, including
    /// mid-run.
    pub fn set_prefix(&self, prefix: impl Into<Vec<u8>>) {
        *self.prefix.lock().unwrap() = prefix.into();
    }

    /// Replace the input and output streams. Must not be called while a
    /// run is in flight.
    pub fn set_io(
        &mut self,
        input: impl Read + Send + 'static,
        output: impl Write + Send + 'static,
    ) {
        self.input = Some(io::shared_reader(Box::new(input)));
        self.output = Some(io::shared_writer(Box::new(output)));
    }

    /// Run the interpreter loop until shutdown.
    ///
    /// Stops gracefully (returning `Ok`) on cancellation, on a non-zero
    /// engine status, and at end-of-input; a trailing newline is written in
    /// those cases to leave the output clean. Stream failures are returned
    /// with the phase they occurred in. Fails fast with
    /// [`Error::NoEngine`] when no engine is attached.
    pub async fn run(&mut self) -> Result<()> {
        let handle = self.engine.clone().ok_or(Error::NoEngine)?;

        let token = self.parent.child_token();
        let intake = match self.signal_source.take() {
            Some(intake) => intake,
            None => signal::os_signals(&token),
        };
        tokio::spawn(signal::monitor(token.clone(), intake, self.handlers.clone()));

        let input = Arc::clone(
            self.input
                .get_or_insert_with(|| io::shared_reader(Box::new(std::io::stdin()))),
        );
        let output = Arc::clone(
            self.output
                .get_or_insert_with(|| io::shared_writer(Box::new(std::io::stdout()))),
        );
        let session_io = SessionIo::new(token.clone(), input, output, Arc::clone(&self.prefix));

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        Arc::clone(&self.registry)
            .attach(&handle, &token, queue_rx)
            .await;
        tracing::debug!("session attached to {:?}", handle.id());

        let result = self.run_loop(&token, &queue_tx, &session_io).await;
        drop(queue_tx);

        let result = match result {
            Ok(()) => session_io.write_newline().await.map(|_| ()),
            Err(e) => Err(e),
        };

        // Tear down the monitor, the runner this run may have started, and
        // any straggling I/O workers' races.
        token.cancel();
        result
    }

    async fn run_loop(
        &self,
        token: &CancellationToken,
        queue: &dispatch::RequestTx,
        session_io: &SessionIo,
    ) -> Result<()> {
        loop {
            match session_io.write_prefix().await {
                Ok(_) => {}
                Err(Error::Cancelled) => return Ok(()),
                Err(e) => return Err(e),
            }

            let raw = match session_io.read_line().await {
                Ok(raw) => raw,
                Err(Error::Cancelled) => return Ok(()),
                Err(e) => return Err(e),
            };
            if raw.is_empty() {
                // End-of-input is terminal as soon as a read comes back
                // empty; no dispatch is issued for it.
                return Ok(());
            }

            let line = trim_line(raw);
            let status = dispatch::exec(token, queue, line, session_io.clone()).await;
            if status != 0 {
                tracing::debug!("engine returned status {status}; stopping session");
                return Ok(());
            }
        }
    }
}

/// Truncate at the first NUL (transports that pad reads) and strip the line
/// terminator.
fn trim_line(mut bytes: Vec<u8>) -> String {
    if let Some(idx) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(idx);
    }
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
