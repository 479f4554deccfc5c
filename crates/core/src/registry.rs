//! Engine registry: at most one live runner per engine identity.
//!
//! Constructed explicitly at the composition root and shared by `Arc`;
//! there is no process-global instance. The map mutex guards lookup, insert,
//! and delete only; the hand-off of a session queue to its runner happens
//! outside the lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::RequestRx;
use crate::engine::{EngineHandle, EngineId};
use crate::runner::{self, ATTACH_CAPACITY, AttachTx};

/// Table of live engine runners, keyed by [`EngineId`].
///
/// Runners are started lazily on first attach and remove their own entry
/// when their root token is cancelled. A stale entry left by a runner that
/// died between lookup and hand-off is removed by the attaching session, so
/// a torn-down engine identity can always be revived by a later attach.
#[derive(Default)]
pub struct Registry {
    runners: Mutex<BTreeMap<EngineId, AttachTx>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session queue with the runner for `handle`, starting a
    /// runner rooted on `token` if none is live.
    ///
    /// Returns once the queue is delivered or `token` is done. A dead runner
    /// discovered during hand-off has its entry dropped and the hand-off is
    /// retried against a fresh runner; the loop terminates because a freshly
    /// spawned runner only exits when `token` itself is cancelled, which the
    /// top-of-loop check catches.
    pub(crate) async fn attach(
        self: Arc<Self>,
        handle: &EngineHandle,
        token: &CancellationToken,
        mut queue: RequestRx,
    ) {
        loop {
            if token.is_cancelled() {
                return;
            }
            let attach_tx = runner_for(&self, handle, token);
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                sent = attach_tx.send(queue) => match sent {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(q)) => {
                        tracing::debug!(
                            "runner for {:?} exited before hand-off; dropping stale entry",
                            handle.id()
                        );
                        self.remove_if(handle.id(), &attach_tx);
                        queue = q;
                    }
                }
            }
        }
    }

    /// Remove the entry for `id`; called by a runner on teardown.
    pub(crate) fn remove(&self, id: EngineId) {
        self.runners.lock().unwrap().remove(&id);
    }

    /// Remove the entry for `id` only if it still holds `stale`, so a
    /// fresher runner registered in the meantime is left alone.
    fn remove_if(&self, id: EngineId, stale: &AttachTx) {
        let mut runners = self.runners.lock().unwrap();
        if runners.get(&id).is_some_and(|tx| tx.same_channel(stale)) {
            runners.remove(&id);
        }
    }

    /// Number of live runners.
    pub fn len(&self) -> usize {
        self.runners.lock().unwrap().len()
    }

    /// Whether no runner is live.
    pub fn is_empty(&self) -> bool {
        self.runners.lock().unwrap().is_empty()
    }
}

/// Look up or spawn the runner for `handle`, returning its attach sender.
fn runner_for(
    registry: &Arc<Registry>,
    handle: &EngineHandle,
    token: &CancellationToken,
) -> AttachTx {
    let mut runners = registry.runners.lock().unwrap();
    if let Some(tx) = runners.get(&handle.id()) {
        return tx.clone();
    }
    let (attach_tx, attach_rx) = mpsc::channel(ATTACH_CAPACITY);
    runners.insert(handle.id(), attach_tx.clone());
    tokio::spawn(runner::run_engine(
        token.clone(),
        handle.id(),
        handle.engine(),
        Arc::clone(registry),
        attach_rx,
    ));
    attach_tx
}
